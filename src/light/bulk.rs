//! Bulk light ingestion from contiguous typed arrays.
//!
//! Hosts spawning tens of thousands of lights pay noticeable overhead on
//! per-light add calls. The bulk paths consume flat arrays (the layout a
//! particle system or level loader already has) and append through the same
//! constructors as the scalar adds, so the resulting store state is
//! identical to a serial add loop.

use glam::Vec3;

use super::types::{
    LightKind, PointLightDesc, RectLightDesc, SpotLightDesc,
};
use super::LightStore;
use crate::animation::{AnimationDesc, PACKED_ANIM_STRIDE};

/// Flat arrays describing `n` point lights. `positions` holds xyz triplets
/// and `colors` rgb triplets; the remaining arrays hold one value per
/// light. `anim_flags`/`anim_params` may be empty for unanimated batches;
/// when present, `anim_params` holds [`PACKED_ANIM_STRIDE`] floats per
/// light.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkPointLights<'a> {
    /// World positions, xyz per light.
    pub positions: &'a [f32],
    /// Influence radii, one per light.
    pub radii: &'a [f32],
    /// Linear RGB colors, rgb per light.
    pub colors: &'a [f32],
    /// Intensities, one per light.
    pub intensities: &'a [f32],
    /// Falloff exponents, one per light.
    pub decays: &'a [f32],
    /// Raw animation flag words, one per light (empty = no animation).
    pub anim_flags: &'a [u32],
    /// Packed animation parameters, [`PACKED_ANIM_STRIDE`] per light.
    pub anim_params: &'a [f32],
}

impl BulkPointLights<'_> {
    fn len(&self) -> usize {
        self.positions.len() / 3
    }

    fn animation(&self, i: usize) -> AnimationDesc {
        if self.anim_flags.is_empty() {
            return AnimationDesc::none();
        }
        let start = i * PACKED_ANIM_STRIDE;
        let params = self
            .anim_params
            .get(start..start + PACKED_ANIM_STRIDE)
            .unwrap_or(&[]);
        AnimationDesc::from_packed(self.anim_flags[i], params)
    }
}

/// Flat arrays describing `n` lights of mixed kinds. The common arrays are
/// laid out exactly like [`BulkPointLights`]; `kinds` selects the variant
/// per light (0 = point, 1 = spot, 2 = rect), and the kind-specific arrays
/// are consumed in order of appearance of that kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkMixedLights<'a> {
    /// Variant code per light (0 / 1 / 2). Unknown codes are skipped.
    pub kinds: &'a [u32],
    /// World positions, xyz per light.
    pub positions: &'a [f32],
    /// Influence radii, one per light.
    pub radii: &'a [f32],
    /// Linear RGB colors, rgb per light.
    pub colors: &'a [f32],
    /// Intensities, one per light.
    pub intensities: &'a [f32],
    /// Falloff exponents, one per light.
    pub decays: &'a [f32],
    /// Raw animation flag words, one per light (empty = no animation).
    pub anim_flags: &'a [u32],
    /// Packed animation parameters, [`PACKED_ANIM_STRIDE`] per light.
    pub anim_params: &'a [f32],
    /// Spot cone directions, xyz per *spot* light, in order.
    pub spot_directions: &'a [f32],
    /// Spot cone half-angles, one per spot light.
    pub spot_angles: &'a [f32],
    /// Spot penumbra widths, one per spot light.
    pub spot_penumbras: &'a [f32],
    /// Rect normals, xyz per *rect* light, in order.
    pub rect_normals: &'a [f32],
    /// Rect extents, width/height pairs per rect light.
    pub rect_sizes: &'a [f32],
}

fn vec3_at(data: &[f32], i: usize) -> Vec3 {
    Vec3::new(data[i * 3], data[i * 3 + 1], data[i * 3 + 2])
}

fn scalar_at(data: &[f32], i: usize, fallback: f32) -> f32 {
    data.get(i).copied().unwrap_or(fallback)
}

impl LightStore {
    /// Append a batch of point lights. Returns the number actually added,
    /// clamped to the remaining capacity.
    pub fn bulk_add_points(&mut self, data: &BulkPointLights<'_>) -> usize {
        let remaining = (self.max_lights() - self.total()) as usize;
        let count = data.len().min(remaining);

        for i in 0..count {
            let desc = PointLightDesc {
                position: vec3_at(data.positions, i),
                color: vec3_at(data.colors, i),
                intensity: scalar_at(data.intensities, i, 1.0),
                radius: scalar_at(data.radii, i, 10.0),
                decay: scalar_at(data.decays, i, 2.0),
                visible: true,
                animation: data.animation(i),
            };
            // Capacity was pre-checked; an add can only fail if the caller
            // mutated the store concurrently, which the API forbids.
            if self.add_point(&desc).is_err() {
                return i;
            }
        }
        count
    }

    /// Append a batch of mixed-kind lights. Returns the number actually
    /// added, clamped to the remaining capacity.
    pub fn bulk_add_mixed(&mut self, data: &BulkMixedLights<'_>) -> usize {
        let remaining = (self.max_lights() - self.total()) as usize;
        let count = data.kinds.len().min(remaining);

        let mut added = 0;
        let mut spot_cursor = 0;
        let mut rect_cursor = 0;
        for i in 0..count {
            let Some(kind) = LightKind::from_code(data.kinds[i]) else {
                log::warn!(
                    "bulk_add_mixed: unknown kind code {} at index {i}, \
                     skipping",
                    data.kinds[i]
                );
                continue;
            };
            let position = vec3_at(data.positions, i);
            let color = vec3_at(data.colors, i);
            let intensity = scalar_at(data.intensities, i, 1.0);
            let radius = scalar_at(data.radii, i, 10.0);
            let decay = scalar_at(data.decays, i, 2.0);
            let animation = if data.anim_flags.is_empty() {
                AnimationDesc::none()
            } else {
                let start = i * PACKED_ANIM_STRIDE;
                AnimationDesc::from_packed(
                    data.anim_flags[i],
                    data.anim_params
                        .get(start..start + PACKED_ANIM_STRIDE)
                        .unwrap_or(&[]),
                )
            };

            let result = match kind {
                LightKind::Point => self.add_point(&PointLightDesc {
                    position,
                    color,
                    intensity,
                    radius,
                    decay,
                    visible: true,
                    animation,
                }),
                LightKind::Spot => {
                    let j = spot_cursor;
                    spot_cursor += 1;
                    self.add_spot(&SpotLightDesc {
                        position,
                        color,
                        intensity,
                        radius,
                        decay,
                        visible: true,
                        direction: vec3_at(data.spot_directions, j),
                        angle: scalar_at(
                            data.spot_angles,
                            j,
                            std::f32::consts::FRAC_PI_4,
                        ),
                        penumbra: scalar_at(data.spot_penumbras, j, 0.1),
                        animation,
                    })
                }
                LightKind::Rect => {
                    let k = rect_cursor;
                    rect_cursor += 1;
                    self.add_rect(&RectLightDesc {
                        position,
                        color,
                        intensity,
                        radius,
                        decay,
                        visible: true,
                        normal: vec3_at(data.rect_normals, k),
                        width: scalar_at(data.rect_sizes, k * 2, 2.0),
                        height: scalar_at(data.rect_sizes, k * 2 + 1, 1.0),
                        animation,
                    })
                }
            };
            if result.is_err() {
                break;
            }
            added += 1;
        }
        added
    }
}
