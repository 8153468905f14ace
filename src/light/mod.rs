//! Light storage: the engine-owned records for every point, spot, and rect
//! light, the stable-id table the host addresses them through, and the
//! Morton-order sort that keeps cluster rasterization spatially coherent.

mod bulk;
pub mod morton;
mod types;

pub use bulk::{BulkMixedLights, BulkPointLights};
pub use types::{
    orthonormal_frame, DirtyFlags, LightCore, LightId, LightKind, LightSlot,
    PointLight, PointLightDesc, RectLight, RectLightDesc, SpotLight,
    SpotLightDesc,
};

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::animation::AnimationDesc;
use crate::error::CandelaError;
use crate::options::EngineOptions;

/// Below this total light count a sort is pointless and can perturb stable
/// addressing, so it is skipped.
const MIN_SORT_COUNT: usize = 3;

/// Owner of all light records.
///
/// The store's arrays are allocated once at creation (sized to
/// `max_lights`) together with the radix-sort scratch buffers, so the
/// steady-state frame loop never allocates. Hosts refer to lights through
/// [`LightId`] handles; the store maintains the id → (kind, index) table
/// across removals and re-sorts.
pub struct LightStore {
    points: Vec<PointLight>,
    spots: Vec<SpotLight>,
    rects: Vec<RectLight>,

    scratch_points: Vec<PointLight>,
    scratch_spots: Vec<SpotLight>,
    scratch_rects: Vec<RectLight>,

    index: FxHashMap<LightId, LightSlot>,
    next_id: u32,
    max_lights: u32,

    needs_sort: bool,
    has_animated: bool,

    /// Bumped on add/remove (count changes force texture reallocation).
    structure_revision: u64,
    /// Bumped on any mutation, including adds and removals.
    content_revision: u64,
}

impl LightStore {
    /// Allocate a store sized to `options.max_lights`.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::ResourceExhausted`] when the fixed
    /// allocations (three record arrays, three sort scratch arrays, and the
    /// packed texture staging the packer will add) would exceed
    /// `options.memory_budget_bytes`.
    pub fn new(options: &EngineOptions) -> Result<Self, CandelaError> {
        let cap = options.max_lights as usize;

        let record_bytes = 2
            * cap
            * (std::mem::size_of::<PointLight>()
                + std::mem::size_of::<SpotLight>()
                + std::mem::size_of::<RectLight>());
        // Packed staging: 2 + 4 + 5 RGBA32F texels per light, worst case.
        let staging_bytes = cap * 11 * 16;
        let required_bytes = record_bytes + staging_bytes;
        if required_bytes > options.memory_budget_bytes {
            return Err(CandelaError::ResourceExhausted {
                required_bytes,
                budget_bytes: options.memory_budget_bytes,
            });
        }

        Ok(Self {
            points: Vec::with_capacity(cap),
            spots: Vec::with_capacity(cap),
            rects: Vec::with_capacity(cap),
            scratch_points: Vec::with_capacity(cap),
            scratch_spots: Vec::with_capacity(cap),
            scratch_rects: Vec::with_capacity(cap),
            index: FxHashMap::default(),
            next_id: 0,
            max_lights: options.max_lights,
            needs_sort: false,
            has_animated: false,
            structure_revision: 0,
            content_revision: 0,
        })
    }

    // -- Counts and accessors ------------------------------------------------

    /// Number of point lights.
    #[must_use]
    pub fn point_count(&self) -> u32 {
        self.points.len() as u32
    }

    /// Number of spot lights.
    #[must_use]
    pub fn spot_count(&self) -> u32 {
        self.spots.len() as u32
    }

    /// Number of rect lights.
    #[must_use]
    pub fn rect_count(&self) -> u32 {
        self.rects.len() as u32
    }

    /// Total light count across all kinds.
    #[must_use]
    pub fn total(&self) -> u32 {
        (self.points.len() + self.spots.len() + self.rects.len()) as u32
    }

    /// The configured capacity.
    #[must_use]
    pub fn max_lights(&self) -> u32 {
        self.max_lights
    }

    /// All point lights, in current (possibly sorted) order.
    #[must_use]
    pub fn points(&self) -> &[PointLight] {
        &self.points
    }

    /// All spot lights, in current (possibly sorted) order.
    #[must_use]
    pub fn spots(&self) -> &[SpotLight] {
        &self.spots
    }

    /// All rect lights, in current (possibly sorted) order.
    #[must_use]
    pub fn rects(&self) -> &[RectLight] {
        &self.rects
    }

    pub(crate) fn points_mut(&mut self) -> &mut [PointLight] {
        &mut self.points
    }

    pub(crate) fn spots_mut(&mut self) -> &mut [SpotLight] {
        &mut self.spots
    }

    pub(crate) fn rects_mut(&mut self) -> &mut [RectLight] {
        &mut self.rects
    }

    /// Resolve an id to its current (kind, index) slot.
    #[must_use]
    pub fn slot_of(&self, id: LightId) -> Option<LightSlot> {
        self.index.get(&id).copied()
    }

    /// Shared state of any light, by id.
    #[must_use]
    pub fn light_core(&self, id: LightId) -> Option<&LightCore> {
        let slot = self.slot_of(id)?;
        Some(match slot.kind {
            LightKind::Point => &self.points[slot.index as usize].core,
            LightKind::Spot => &self.spots[slot.index as usize].core,
            LightKind::Rect => &self.rects[slot.index as usize].core,
        })
    }

    /// A spot light's full record, by id.
    #[must_use]
    pub fn spot(&self, id: LightId) -> Option<&SpotLight> {
        match self.slot_of(id)? {
            LightSlot {
                kind: LightKind::Spot,
                index,
            } => self.spots.get(index as usize),
            _ => None,
        }
    }

    /// A rect light's full record, by id.
    #[must_use]
    pub fn rect(&self, id: LightId) -> Option<&RectLight> {
        match self.slot_of(id)? {
            LightSlot {
                kind: LightKind::Rect,
                index,
            } => self.rects.get(index as usize),
            _ => None,
        }
    }

    /// Whether any stored light carries an animation.
    #[must_use]
    pub fn has_animated(&self) -> bool {
        self.has_animated
    }

    /// Whether a Morton re-sort is pending.
    #[must_use]
    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }

    /// Bumped whenever the light count changes.
    #[must_use]
    pub fn structure_revision(&self) -> u64 {
        self.structure_revision
    }

    /// Bumped on every mutation (including adds and removals).
    #[must_use]
    pub fn content_revision(&self) -> u64 {
        self.content_revision
    }

    // -- Add -----------------------------------------------------------------

    fn ensure_capacity(&self) -> Result<(), CandelaError> {
        if self.total() >= self.max_lights {
            Err(CandelaError::Capacity {
                max_lights: self.max_lights,
            })
        } else {
            Ok(())
        }
    }

    fn alloc_id(&mut self) -> LightId {
        let id = LightId(self.next_id);
        self.next_id += 1;
        id
    }

    fn register_add(&mut self, id: LightId, slot: LightSlot, animated: bool) {
        let _ = self.index.insert(id, slot);
        self.has_animated |= animated;
        self.needs_sort = true;
        self.structure_revision += 1;
        self.content_revision += 1;
    }

    /// Add a point light.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_point(
        &mut self,
        desc: &PointLightDesc,
    ) -> Result<LightId, CandelaError> {
        self.ensure_capacity()?;
        let id = self.alloc_id();
        let core = LightCore::new(
            id,
            desc.position,
            desc.color,
            desc.intensity,
            desc.radius,
            desc.decay,
            desc.visible,
            desc.animation,
        );
        let slot = LightSlot {
            kind: LightKind::Point,
            index: self.points.len() as u32,
        };
        self.points.push(PointLight { core });
        self.register_add(id, slot, desc.animation.is_animated());
        Ok(id)
    }

    /// Add a spot light. The direction is normalized here; degenerate input
    /// falls back to -Y.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_spot(
        &mut self,
        desc: &SpotLightDesc,
    ) -> Result<LightId, CandelaError> {
        self.ensure_capacity()?;
        let id = self.alloc_id();
        let core = LightCore::new(
            id,
            desc.position,
            desc.color,
            desc.intensity,
            desc.radius,
            desc.decay,
            desc.visible,
            desc.animation,
        );
        let direction =
            desc.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let slot = LightSlot {
            kind: LightKind::Spot,
            index: self.spots.len() as u32,
        };
        self.spots.push(SpotLight {
            core,
            base_direction: direction,
            direction,
            view_direction: direction,
            angle: desc.angle,
            penumbra: desc.penumbra,
        });
        self.register_add(id, slot, desc.animation.is_animated());
        Ok(id)
    }

    /// Add a rectangular area light. The normal is normalized here
    /// (degenerate input falls back to +Z) and the tangent frame is derived
    /// from it.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_rect(
        &mut self,
        desc: &RectLightDesc,
    ) -> Result<LightId, CandelaError> {
        self.ensure_capacity()?;
        let id = self.alloc_id();
        let core = LightCore::new(
            id,
            desc.position,
            desc.color,
            desc.intensity,
            desc.radius,
            desc.decay,
            desc.visible,
            desc.animation,
        );
        let normal = desc.normal.try_normalize().unwrap_or(Vec3::Z);
        let (tangent, bitangent) = orthonormal_frame(normal);
        let slot = LightSlot {
            kind: LightKind::Rect,
            index: self.rects.len() as u32,
        };
        self.rects.push(RectLight {
            core,
            width: desc.width,
            height: desc.height,
            base_normal: normal,
            base_tangent: tangent,
            base_bitangent: bitangent,
            normal,
            tangent,
            bitangent,
            view_normal: normal,
            view_tangent: tangent,
        });
        self.register_add(id, slot, desc.animation.is_animated());
        Ok(id)
    }

    // -- Remove --------------------------------------------------------------

    /// Remove a light by id. Returns `false` (and logs) for unknown ids.
    ///
    /// Removal shifts the tail of the per-kind array left, preserving the
    /// current Morton order, and fixes up every id mapping behind the
    /// removed slot.
    pub fn remove(&mut self, id: LightId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            log::warn!("remove: unknown light id {id:?}");
            return false;
        };

        let removed_animated = match slot.kind {
            LightKind::Point => {
                let light = self.points.remove(slot.index as usize);
                light.core.animation.is_animated()
            }
            LightKind::Spot => {
                let light = self.spots.remove(slot.index as usize);
                light.core.animation.is_animated()
            }
            LightKind::Rect => {
                let light = self.rects.remove(slot.index as usize);
                light.core.animation.is_animated()
            }
        };

        for mapped in self.index.values_mut() {
            if mapped.kind == slot.kind && mapped.index > slot.index {
                mapped.index -= 1;
            }
        }

        if removed_animated {
            self.rescan_animated();
        }
        self.structure_revision += 1;
        self.content_revision += 1;
        true
    }

    fn rescan_animated(&mut self) {
        self.has_animated = self
            .points
            .iter()
            .map(|l| &l.core)
            .chain(self.spots.iter().map(|l| &l.core))
            .chain(self.rects.iter().map(|l| &l.core))
            .any(|core| core.animation.is_animated());
    }

    // -- Mutation ------------------------------------------------------------

    fn core_mut(&mut self, slot: LightSlot) -> &mut LightCore {
        match slot.kind {
            LightKind::Point => &mut self.points[slot.index as usize].core,
            LightKind::Spot => &mut self.spots[slot.index as usize].core,
            LightKind::Rect => &mut self.rects[slot.index as usize].core,
        }
    }

    fn resolve(&self, id: LightId) -> Result<LightSlot, CandelaError> {
        self.slot_of(id).ok_or(CandelaError::NotFound(id))
    }

    /// Resolve an id for mutation, logging and yielding `None` when unknown.
    fn resolve_logged(&self, id: LightId, op: &str) -> Option<LightSlot> {
        match self.resolve(id) {
            Ok(slot) => Some(slot),
            Err(_) => {
                log::warn!("{op}: unknown light id {id:?}, ignoring");
                None
            }
        }
    }

    /// Set a light's canonical world position. Re-derives the Morton code
    /// and schedules a re-sort.
    pub fn set_position(&mut self, id: LightId, position: Vec3) {
        let Some(slot) = self.resolve_logged(id, "set_position") else {
            return;
        };
        let core = self.core_mut(slot);
        core.base_position = position;
        core.position = position;
        core.refresh_morton();
        core.dirty |= DirtyFlags::POSITION;
        self.needs_sort = true;
        self.content_revision += 1;
    }

    /// Set a light's color.
    pub fn set_color(&mut self, id: LightId, color: Vec3) {
        let Some(slot) = self.resolve_logged(id, "set_color") else {
            return;
        };
        let core = self.core_mut(slot);
        core.color = color;
        core.dirty |= DirtyFlags::COLOR;
        self.content_revision += 1;
    }

    /// Set a light's canonical intensity.
    pub fn set_intensity(&mut self, id: LightId, intensity: f32) {
        let Some(slot) = self.resolve_logged(id, "set_intensity") else {
            return;
        };
        let core = self.core_mut(slot);
        core.base_intensity = intensity;
        core.intensity = intensity;
        core.dirty |= DirtyFlags::COLOR;
        self.content_revision += 1;
    }

    /// Set a light's canonical influence radius.
    pub fn set_radius(&mut self, id: LightId, radius: f32) {
        let Some(slot) = self.resolve_logged(id, "set_radius") else {
            return;
        };
        let core = self.core_mut(slot);
        core.base_radius = radius;
        core.radius = radius;
        core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Set a light's falloff exponent.
    pub fn set_decay(&mut self, id: LightId, decay: f32) {
        let Some(slot) = self.resolve_logged(id, "set_decay") else {
            return;
        };
        let core = self.core_mut(slot);
        core.decay = decay;
        core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Show or hide a light.
    pub fn set_visible(&mut self, id: LightId, visible: bool) {
        let Some(slot) = self.resolve_logged(id, "set_visible") else {
            return;
        };
        let core = self.core_mut(slot);
        core.visible = visible;
        core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Replace a light's animation. Clearing the animation also resets the
    /// transient fields back to their canonical values.
    pub fn set_animation(&mut self, id: LightId, animation: AnimationDesc) {
        let Some(slot) = self.resolve_logged(id, "set_animation") else {
            return;
        };
        let core = self.core_mut(slot);
        core.animation = animation;
        if !animation.is_animated() {
            core.position = core.base_position;
            core.intensity = core.base_intensity;
            core.radius = core.base_radius;
        }
        core.dirty |= DirtyFlags::ALL;
        self.rescan_animated();
        self.content_revision += 1;
    }

    /// Set a spot light's cone direction (normalized here). Ignored with a
    /// log for non-spot ids.
    pub fn set_spot_direction(&mut self, id: LightId, direction: Vec3) {
        let Some(slot) = self.resolve_logged(id, "set_spot_direction") else {
            return;
        };
        if slot.kind != LightKind::Spot {
            log::warn!("set_spot_direction: light {id:?} is not a spot");
            return;
        }
        let spot = &mut self.spots[slot.index as usize];
        let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        spot.base_direction = direction;
        spot.direction = direction;
        spot.core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Set a spot light's cone half-angle and penumbra width.
    pub fn set_spot_cone(&mut self, id: LightId, angle: f32, penumbra: f32) {
        let Some(slot) = self.resolve_logged(id, "set_spot_cone") else {
            return;
        };
        if slot.kind != LightKind::Spot {
            log::warn!("set_spot_cone: light {id:?} is not a spot");
            return;
        }
        let spot = &mut self.spots[slot.index as usize];
        spot.angle = angle;
        spot.penumbra = penumbra.clamp(0.0, 1.0);
        spot.core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Set a rect light's normal (normalized here) and re-derive its
    /// tangent frame.
    pub fn set_rect_normal(&mut self, id: LightId, normal: Vec3) {
        let Some(slot) = self.resolve_logged(id, "set_rect_normal") else {
            return;
        };
        if slot.kind != LightKind::Rect {
            log::warn!("set_rect_normal: light {id:?} is not a rect");
            return;
        }
        let rect = &mut self.rects[slot.index as usize];
        let normal = normal.try_normalize().unwrap_or(Vec3::Z);
        let (tangent, bitangent) = orthonormal_frame(normal);
        rect.base_normal = normal;
        rect.base_tangent = tangent;
        rect.base_bitangent = bitangent;
        rect.normal = normal;
        rect.tangent = tangent;
        rect.bitangent = bitangent;
        rect.core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Set a rect light's extents.
    pub fn set_rect_size(&mut self, id: LightId, width: f32, height: f32) {
        let Some(slot) = self.resolve_logged(id, "set_rect_size") else {
            return;
        };
        if slot.kind != LightKind::Rect {
            log::warn!("set_rect_size: light {id:?} is not a rect");
            return;
        }
        let rect = &mut self.rects[slot.index as usize];
        rect.width = width;
        rect.height = height;
        rect.core.dirty |= DirtyFlags::PARAMS;
        self.content_revision += 1;
    }

    /// Clear every light's dirty bits (called after a full repack).
    pub(crate) fn clear_dirty(&mut self) {
        for light in &mut self.points {
            light.core.dirty = DirtyFlags::empty();
        }
        for light in &mut self.spots {
            light.core.dirty = DirtyFlags::empty();
        }
        for light in &mut self.rects {
            light.core.dirty = DirtyFlags::empty();
        }
    }

    // -- Sorting -------------------------------------------------------------

    /// Run the pending Morton sort, if any.
    ///
    /// No-ops when nothing changed since the last sort, and is skipped
    /// entirely below three total lights. Animation never schedules a sort:
    /// the codes derive from base positions only.
    pub fn sort(&mut self) {
        if !self.needs_sort {
            return;
        }
        self.needs_sort = false;
        if (self.total() as usize) < MIN_SORT_COUNT {
            return;
        }

        morton::radix_sort_by_key(
            &mut self.points,
            &mut self.scratch_points,
            |l| l.core.morton,
        );
        morton::radix_sort_by_key(&mut self.spots, &mut self.scratch_spots, |l| {
            l.core.morton
        });
        morton::radix_sort_by_key(&mut self.rects, &mut self.scratch_rects, |l| {
            l.core.morton
        });

        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, light) in self.points.iter().enumerate() {
            let _ = self.index.insert(
                light.core.id,
                LightSlot {
                    kind: LightKind::Point,
                    index: i as u32,
                },
            );
        }
        for (i, light) in self.spots.iter().enumerate() {
            let _ = self.index.insert(
                light.core.id,
                LightSlot {
                    kind: LightKind::Spot,
                    index: i as u32,
                },
            );
        }
        for (i, light) in self.rects.iter().enumerate() {
            let _ = self.index.insert(
                light.core.id,
                LightSlot {
                    kind: LightKind::Rect,
                    index: i as u32,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> LightStore {
        let options = EngineOptions {
            max_lights: 64,
            ..EngineOptions::default()
        };
        LightStore::new(&options).unwrap()
    }

    fn point_at(x: f32, z: f32) -> PointLightDesc {
        PointLightDesc {
            position: Vec3::new(x, 0.0, z),
            ..PointLightDesc::default()
        }
    }

    #[test]
    fn test_capacity_limit() {
        let options = EngineOptions {
            max_lights: 2,
            ..EngineOptions::default()
        };
        let mut store = LightStore::new(&options).unwrap();
        assert!(store.add_point(&point_at(0.0, 0.0)).is_ok());
        assert!(store.add_point(&point_at(1.0, 0.0)).is_ok());
        assert!(matches!(
            store.add_point(&point_at(2.0, 0.0)),
            Err(CandelaError::Capacity { max_lights: 2 })
        ));
    }

    #[test]
    fn test_memory_budget() {
        let options = EngineOptions {
            max_lights: 1_000_000,
            memory_budget_bytes: 1024,
            ..EngineOptions::default()
        };
        assert!(matches!(
            LightStore::new(&options),
            Err(CandelaError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_morton_assigned_from_base_position() {
        let mut store = small_store();
        let id = store.add_point(&point_at(3.0, 5.0)).unwrap();
        let core = store.light_core(id).unwrap();
        assert_eq!(core.morton, morton::morton2d(3, 5));
    }

    #[test]
    fn test_sort_orders_by_morton_and_rebuilds_index() {
        let mut store = small_store();
        let far = store.add_point(&point_at(1000.0, 1000.0)).unwrap();
        let near = store.add_point(&point_at(1.0, 1.0)).unwrap();
        let mid = store.add_point(&point_at(40.0, 40.0)).unwrap();
        store.sort();

        let mortons: Vec<u32> =
            store.points().iter().map(|l| l.core.morton).collect();
        let mut sorted = mortons.clone();
        sorted.sort_unstable();
        assert_eq!(mortons, sorted);

        // Ids still resolve to the right lights
        for id in [far, near, mid] {
            let core = store.light_core(id).unwrap();
            assert_eq!(core.id, id);
        }
    }

    #[test]
    fn test_sort_skipped_below_three_lights() {
        let mut store = small_store();
        let a = store.add_point(&point_at(100.0, 100.0)).unwrap();
        let b = store.add_point(&point_at(1.0, 1.0)).unwrap();
        store.sort();
        // Insertion order preserved
        assert_eq!(store.points()[0].core.id, a);
        assert_eq!(store.points()[1].core.id, b);
        assert!(!store.needs_sort());
    }

    #[test]
    fn test_sort_idempotent() {
        let mut store = small_store();
        for i in 0..20 {
            let _ = store
                .add_point(&point_at((997 * i % 64) as f32, (i * 13 % 64) as f32))
                .unwrap();
        }
        store.sort();
        let order: Vec<LightId> =
            store.points().iter().map(|l| l.core.id).collect();
        // Force another pass over identical data
        store.needs_sort = true;
        store.sort();
        let order2: Vec<LightId> =
            store.points().iter().map(|l| l.core.id).collect();
        assert_eq!(order, order2);
    }

    #[test]
    fn test_remove_shifts_tail_and_fixes_index() {
        let mut store = small_store();
        let a = store.add_point(&point_at(1.0, 0.0)).unwrap();
        let b = store.add_point(&point_at(2.0, 0.0)).unwrap();
        let c = store.add_point(&point_at(3.0, 0.0)).unwrap();
        assert!(store.remove(a));
        assert_eq!(store.point_count(), 2);
        assert_eq!(store.slot_of(b).unwrap().index, 0);
        assert_eq!(store.slot_of(c).unwrap().index, 1);
        assert_eq!(store.slot_of(a), None);
        // Removing again is a logged no-op
        assert!(!store.remove(a));
    }

    #[test]
    fn test_animated_flag_tracks_membership() {
        use crate::animation::{AnimationDesc, PulseAnim};

        let mut store = small_store();
        assert!(!store.has_animated());
        let animated = store
            .add_point(&PointLightDesc {
                animation: AnimationDesc::none()
                    .with_pulse(PulseAnim::default()),
                ..point_at(0.0, 0.0)
            })
            .unwrap();
        let _plain = store.add_point(&point_at(1.0, 0.0)).unwrap();
        assert!(store.has_animated());
        assert!(store.remove(animated));
        assert!(!store.has_animated());
    }

    #[test]
    fn test_set_position_refreshes_morton_and_schedules_sort() {
        let mut store = small_store();
        let id = store.add_point(&point_at(0.0, 0.0)).unwrap();
        store.sort();
        assert!(!store.needs_sort());
        store.set_position(id, Vec3::new(7.0, 0.0, 9.0));
        assert!(store.needs_sort());
        assert_eq!(
            store.light_core(id).unwrap().morton,
            morton::morton2d(7, 9)
        );
    }

    #[test]
    fn test_unknown_id_mutation_is_ignored() {
        let mut store = small_store();
        let id = store.add_point(&point_at(0.0, 0.0)).unwrap();
        store.set_color(LightId(999), Vec3::X);
        // Known light untouched
        assert_eq!(store.light_core(id).unwrap().color, Vec3::ONE);
    }

    #[test]
    fn test_mutation_stability_under_random_ops() {
        use rand::prelude::IndexedRandom;
        use rand::Rng;
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(0xC1A5);
        let options = EngineOptions {
            max_lights: 128,
            ..EngineOptions::default()
        };
        let mut store = LightStore::new(&options).unwrap();
        let mut expected: std::collections::HashMap<LightId, (Vec3, Vec3)> =
            std::collections::HashMap::new();

        for _ in 0..600 {
            match rng.random_range(0..5) {
                0 | 1 => {
                    let pos = Vec3::new(
                        rng.random_range(0.0..1000.0),
                        0.0,
                        rng.random_range(0.0..1000.0),
                    );
                    if let Ok(id) = store.add_point(&PointLightDesc {
                        position: pos,
                        ..PointLightDesc::default()
                    }) {
                        let _ = expected.insert(id, (pos, Vec3::ONE));
                    }
                }
                2 => {
                    if let Some(&id) =
                        expected.keys().copied().collect::<Vec<_>>().choose(&mut rng)
                    {
                        assert!(store.remove(id));
                        let _ = expected.remove(&id);
                    }
                }
                3 => {
                    if let Some(&id) =
                        expected.keys().copied().collect::<Vec<_>>().choose(&mut rng)
                    {
                        let pos = Vec3::new(
                            rng.random_range(0.0..1000.0),
                            0.0,
                            rng.random_range(0.0..1000.0),
                        );
                        store.set_position(id, pos);
                        if let Some(entry) = expected.get_mut(&id) {
                            entry.0 = pos;
                        }
                    }
                }
                _ => {
                    store.sort();
                }
            }
        }
        store.sort();

        // Every surviving id reverse-resolves to a light holding the
        // last-set properties.
        assert_eq!(store.total() as usize, expected.len());
        for (id, (pos, color)) in &expected {
            let core = store.light_core(*id).expect("id must resolve");
            assert_eq!(core.id, *id);
            assert_eq!(core.base_position, *pos);
            assert_eq!(core.color, *color);
            assert_eq!(core.morton, morton::morton_for(*pos));
        }
    }
}
