//! The engine's public surface: light CRUD, the per-frame update, texture
//! and uniform accessors, and material patching.

use glam::{Mat4, Vec3};

use crate::animation::{evaluate_store, AnimationDesc};
use crate::cluster::passes::ClusterPipeline;
use crate::cluster::{ClusterGrid, ClusterResolution};
use crate::error::CandelaError;
use crate::gpu::{GpuContext, LightTextures};
use crate::light::{
    BulkMixedLights, BulkPointLights, LightId, LightStore, PointLightDesc,
    RectLightDesc, SpotLightDesc,
};
use crate::material::{
    ClusterUniformValues, EngineTexture, MaterialPatcher, MaterialShader,
    SnippetVariant,
};
use crate::options::EngineOptions;
use crate::packer::{texture_width_for, PackedLightTextures};
use crate::view::{apply_view_transform, CameraState};

use std::cell::RefCell;
use std::rc::Rc;

/// Per-frame visibility and LOD counters, refreshed by
/// [`CandelaEngine::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Point lights passing the visibility + depth test.
    pub point_visible: u32,
    /// Spot lights passing the visibility + depth test.
    pub spot_visible: u32,
    /// Rect lights passing the visibility + depth test.
    pub rect_visible: u32,
    /// Lights culled by the near/far band or the host's visibility flag.
    pub culled: u32,
    /// Histogram over LOD tiers 0-3 (visible lights only).
    pub lod_counts: [u32; 4],
    /// Total stored lights.
    pub total: u32,
}

impl FrameStats {
    /// Gather stats from a store's post-transform state.
    #[must_use]
    pub fn collect(store: &LightStore) -> Self {
        let mut stats = Self {
            total: store.total(),
            ..Self::default()
        };
        let mut tally = |visible: bool, lod: u8, counter: &mut u32| {
            if visible {
                *counter += 1;
                stats.lod_counts[usize::from(lod.min(3))] += 1;
            } else {
                stats.culled += 1;
            }
        };
        let mut point_visible = 0;
        let mut spot_visible = 0;
        let mut rect_visible = 0;
        for light in store.points() {
            tally(
                light.core.shader_visible,
                light.core.lod,
                &mut point_visible,
            );
        }
        for light in store.spots() {
            tally(light.core.shader_visible, light.core.lod, &mut spot_visible);
        }
        for light in store.rects() {
            tally(light.core.shader_visible, light.core.lod, &mut rect_visible);
        }
        stats.point_visible = point_visible;
        stats.spot_visible = spot_visible;
        stats.rect_visible = rect_visible;
        stats
    }
}

/// The clustered forward lighting engine.
///
/// Sits between a host renderer (which owns the camera, geometry,
/// materials, and back buffer) and the GPU. Each frame the host calls
/// [`update`](Self::update); afterwards the packed light textures and the
/// cluster list/master targets reflect the new state and any material
/// patched through [`patch_material`](Self::patch_material) carries fresh
/// uniform values.
///
/// # Frame ordering
///
/// `update` runs animation → view transform + LOD → texture packing →
/// upload → list pass → master pass → optional super-master pass, encoded
/// into a single command submission. Each step sees the completed output
/// of the previous one.
///
/// # Teardown
///
/// Dropping the engine releases every GPU resource it created. Patched
/// materials stay valid; their cluster uniforms simply stop updating.
pub struct CandelaEngine {
    context: GpuContext,
    options: EngineOptions,
    store: LightStore,
    packed: PackedLightTextures,
    grid: ClusterGrid,
    light_textures: LightTextures,
    cluster: ClusterPipeline,
    patcher: MaterialPatcher,
    stats: FrameStats,
    last_view: Mat4,
    last_content_revision: u64,
}

impl CandelaEngine {
    /// Create an engine on the host's device.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::ResourceExhausted`] when the configured
    /// capacity exceeds the memory budget, or
    /// [`CandelaError::UnsupportedGpu`] when the initial textures exceed
    /// device limits.
    pub fn new(
        context: GpuContext,
        options: EngineOptions,
    ) -> Result<Self, CandelaError> {
        let store = LightStore::new(&options)?;
        let width = texture_width_for(context.max_texture_dimension());
        let mut packed = PackedLightTextures::new(width);
        packed.repack(&store);

        let grid = ClusterGrid::new(Self::resolution(&options, 0), 0);
        let light_textures = LightTextures::new(&context, &packed)?;
        let cluster = ClusterPipeline::new(
            &context,
            &grid,
            options.enable_super_master,
            &light_textures,
        )?;
        let patcher = MaterialPatcher::new(options.enable_super_master);

        log::debug!(
            "engine up: max {} lights, {}x{}x{} clusters, texture width {width}",
            options.max_lights,
            grid.resolution.x,
            grid.resolution.y,
            grid.resolution.z,
        );

        Ok(Self {
            context,
            options,
            store,
            packed,
            grid,
            light_textures,
            cluster,
            patcher,
            stats: FrameStats::default(),
            last_view: Mat4::IDENTITY,
            last_content_revision: 0,
        })
    }

    fn resolution(options: &EngineOptions, total: u32) -> ClusterResolution {
        options.cluster_resolution.map_or_else(
            || ClusterResolution::for_light_count(total),
            |[x, y, z]| ClusterResolution { x, y, z },
        )
    }

    fn maybe_sort(&mut self) {
        if !self.options.defer_sorting {
            self.store.sort();
        }
    }

    // -- Light CRUD ----------------------------------------------------------

    /// Add a point light.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_point(
        &mut self,
        desc: &PointLightDesc,
    ) -> Result<LightId, CandelaError> {
        let id = self.store.add_point(desc)?;
        self.maybe_sort();
        Ok(id)
    }

    /// Add a spot light.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_spot(
        &mut self,
        desc: &SpotLightDesc,
    ) -> Result<LightId, CandelaError> {
        let id = self.store.add_spot(desc)?;
        self.maybe_sort();
        Ok(id)
    }

    /// Add a rect light.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::Capacity`] at the configured limit.
    pub fn add_rect(
        &mut self,
        desc: &RectLightDesc,
    ) -> Result<LightId, CandelaError> {
        let id = self.store.add_rect(desc)?;
        self.maybe_sort();
        Ok(id)
    }

    /// Append a batch of point lights; returns the number added.
    pub fn bulk_add_points(&mut self, data: &BulkPointLights<'_>) -> usize {
        let added = self.store.bulk_add_points(data);
        self.maybe_sort();
        added
    }

    /// Append a batch of mixed-kind lights; returns the number added.
    pub fn bulk_add_mixed(&mut self, data: &BulkMixedLights<'_>) -> usize {
        let added = self.store.bulk_add_mixed(data);
        self.maybe_sort();
        added
    }

    /// Remove a light by id. Unknown ids log and return `false`.
    pub fn remove(&mut self, id: LightId) -> bool {
        self.store.remove(id)
    }

    /// Set a light's world position.
    pub fn set_position(&mut self, id: LightId, position: Vec3) {
        self.store.set_position(id, position);
        self.maybe_sort();
    }

    /// Set a light's color.
    pub fn set_color(&mut self, id: LightId, color: Vec3) {
        self.store.set_color(id, color);
    }

    /// Set a light's intensity.
    pub fn set_intensity(&mut self, id: LightId, intensity: f32) {
        self.store.set_intensity(id, intensity);
    }

    /// Set a light's influence radius.
    pub fn set_radius(&mut self, id: LightId, radius: f32) {
        self.store.set_radius(id, radius);
    }

    /// Set a light's falloff exponent.
    pub fn set_decay(&mut self, id: LightId, decay: f32) {
        self.store.set_decay(id, decay);
    }

    /// Show or hide a light.
    pub fn set_visible(&mut self, id: LightId, visible: bool) {
        self.store.set_visible(id, visible);
    }

    /// Replace a light's animation.
    pub fn set_animation(&mut self, id: LightId, animation: AnimationDesc) {
        self.store.set_animation(id, animation);
    }

    /// Set a spot light's cone direction.
    pub fn set_spot_direction(&mut self, id: LightId, direction: Vec3) {
        self.store.set_spot_direction(id, direction);
    }

    /// Set a spot light's cone half-angle and penumbra.
    pub fn set_spot_cone(&mut self, id: LightId, angle: f32, penumbra: f32) {
        self.store.set_spot_cone(id, angle, penumbra);
    }

    /// Set a rect light's normal.
    pub fn set_rect_normal(&mut self, id: LightId, normal: Vec3) {
        self.store.set_rect_normal(id, normal);
    }

    /// Set a rect light's extents.
    pub fn set_rect_size(&mut self, id: LightId, width: f32, height: f32) {
        self.store.set_rect_size(id, width, height);
    }

    /// Batch many adds/mutations without intermediate sorts; a single sort
    /// is issued at the next [`update`](Self::update).
    pub fn set_defer_sorting(&mut self, defer: bool) {
        self.options.defer_sorting = defer;
    }

    /// Read access to the light store.
    #[must_use]
    pub fn lights(&self) -> &LightStore {
        &self.store
    }

    /// The engine options.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Last frame's visibility/LOD counters.
    #[must_use]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    // -- Frame update --------------------------------------------------------

    /// Advance the engine one frame: animation, view transform + LOD,
    /// texture packing, upload, and the cluster GPU passes.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::UnsupportedGpu`] when a light-count change
    /// demands textures beyond the device limits.
    pub fn update(
        &mut self,
        time: f32,
        camera: &CameraState,
    ) -> Result<(), CandelaError> {
        // Deferred sorts land before anything reads the light order
        self.store.sort();

        let camera_moved = camera.view != self.last_view;
        let animated = self.store.has_animated();
        if animated {
            evaluate_store(&mut self.store, time);
        }
        apply_view_transform(&mut self.store, camera, self.options.lod_bias);

        let total = self.store.total();
        let grid = ClusterGrid::new(Self::resolution(&self.options, total), total);
        if grid != self.grid {
            self.grid = grid;
            self.cluster
                .rebuild(&self.context, &self.grid, &self.light_textures)?;
        }

        let content_changed =
            self.store.content_revision() != self.last_content_revision;
        if camera_moved || animated || content_changed {
            self.packed.repack(&self.store);
            self.store.clear_dirty();
        }

        if self.light_textures.ensure(&self.context, &self.packed)? {
            self.cluster.rebind(&self.context, &self.light_textures);
        }
        if self.packed.needs_upload() {
            self.light_textures.upload(&self.context.queue, &self.packed);
            self.packed.mark_uploaded();
        }

        let counts = [
            self.store.point_count(),
            self.store.spot_count(),
            self.store.rect_count(),
        ];
        self.cluster.write_uniforms(
            &self.context.queue,
            &self.grid,
            camera,
            counts,
            self.packed.width(),
            self.options.tile_span(),
        );
        let _ = self.patcher.refresh_variant(counts[0], counts[1], counts[2]);
        self.patcher.write_uniforms(&self.uniform_values(camera));

        let mut encoder = self.context.create_encoder();
        self.cluster.encode(&mut encoder, total);
        self.context.submit(encoder);

        self.stats = FrameStats::collect(&self.store);
        self.last_view = camera.view;
        self.last_content_revision = self.store.content_revision();
        Ok(())
    }

    fn uniform_values(&self, camera: &CameraState) -> ClusterUniformValues {
        ClusterUniformValues {
            cluster_params: self.grid.cluster_params(camera),
            slice_params: self.grid.slice_params(),
            light_counts: Vec3::new(
                self.store.point_count() as f32,
                self.store.spot_count() as f32,
                self.store.rect_count() as f32,
            ),
            point_light_texture_width: self.packed.width() as i32,
            max_tile_span: self.options.tile_span(),
        }
    }

    // -- Host wiring ---------------------------------------------------------

    /// Splice the cluster snippet into a host material and register it for
    /// uniform updates and variant re-splices.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::InvalidArgument`] when the fragment source
    /// lacks a splice marker.
    pub fn patch_material(
        &mut self,
        material: &Rc<RefCell<MaterialShader>>,
    ) -> Result<(), CandelaError> {
        let _ = self.patcher.refresh_variant(
            self.store.point_count(),
            self.store.spot_count(),
            self.store.rect_count(),
        );
        self.patcher.patch(material)
    }

    /// The currently selected snippet variant.
    #[must_use]
    pub fn snippet_variant(&self) -> SnippetVariant {
        self.patcher.variant()
    }

    /// The current cluster grid.
    #[must_use]
    pub fn grid(&self) -> &ClusterGrid {
        &self.grid
    }

    /// Resolve one of the engine textures a patched material references.
    /// `ClusterSuperMaster` is `None` unless enabled in the options.
    #[must_use]
    pub fn texture_view(&self, texture: EngineTexture) -> Option<&wgpu::TextureView> {
        match texture {
            EngineTexture::PointLights => Some(self.light_textures.point_view()),
            EngineTexture::SpotLights => Some(self.light_textures.spot_view()),
            EngineTexture::RectLights => Some(self.light_textures.rect_view()),
            EngineTexture::ClusterList => Some(&self.cluster.targets().list.view),
            EngineTexture::ClusterMaster => {
                Some(&self.cluster.targets().master.view)
            }
            EngineTexture::ClusterSuperMaster => self
                .cluster
                .targets()
                .super_master
                .as_ref()
                .map(|target| &target.view),
        }
    }

    /// View of the RGBA8 cluster list.
    #[must_use]
    pub fn list_texture(&self) -> &wgpu::TextureView {
        &self.cluster.targets().list.view
    }

    /// View of the per-tile occupancy words.
    #[must_use]
    pub fn master_texture(&self) -> &wgpu::TextureView {
        &self.cluster.targets().master.view
    }

    /// View of the optional 8x8 reduction.
    #[must_use]
    pub fn super_master_texture(&self) -> Option<&wgpu::TextureView> {
        self.texture_view(EngineTexture::ClusterSuperMaster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::apply_view_transform;

    #[test]
    fn test_frame_stats_tally() {
        let options = EngineOptions {
            max_lights: 16,
            ..EngineOptions::default()
        };
        let mut store = LightStore::new(&options).unwrap();
        // Near light at LOD 3, far light at LOD 1, one hidden
        let _near = store
            .add_point(&PointLightDesc {
                position: Vec3::new(0.0, 0.0, -5.0),
                radius: 10.0,
                ..PointLightDesc::default()
            })
            .unwrap();
        let _far = store
            .add_point(&PointLightDesc {
                position: Vec3::new(0.0, 0.0, -170.0),
                radius: 10.0,
                ..PointLightDesc::default()
            })
            .unwrap();
        let _hidden = store
            .add_point(&PointLightDesc {
                visible: false,
                ..PointLightDesc::default()
            })
            .unwrap();

        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut store, &camera, 1.0);
        let stats = FrameStats::collect(&store);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.point_visible, 2);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.lod_counts[3], 1);
        assert_eq!(stats.lod_counts[1], 1);
    }

    #[test]
    fn test_resolution_override() {
        let options = EngineOptions {
            cluster_resolution: Some([4, 4, 4]),
            ..EngineOptions::default()
        };
        assert_eq!(
            CandelaEngine::resolution(&options, 50_000),
            ClusterResolution { x: 4, y: 4, z: 4 }
        );
        let auto = EngineOptions::default();
        assert_eq!(
            CandelaEngine::resolution(&auto, 10),
            ClusterResolution { x: 16, y: 8, z: 16 }
        );
    }
}
