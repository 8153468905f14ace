//! CPU-side population of the packed light parameter textures.
//!
//! Three RGBA32F textures carry the per-light shading parameters the
//! fragment traversal reads: point records span two texels laid out as a
//! rectangle, spot records four texels and rect records five texels in a
//! single row. The float encodings here are read back verbatim by the GLSL
//! snippet, so every formula in this module is part of the wire contract.

use crate::light::LightStore;

/// Texels per point light record.
pub const POINT_TEXELS: u32 = 2;
/// Texels per spot light record.
pub const SPOT_TEXELS: u32 = 4;
/// Texels per rect light record.
pub const RECT_TEXELS: u32 = 5;

/// Pick the 2D width of the point texture from the device's maximum
/// texture dimension.
#[must_use]
pub fn texture_width_for(max_texture_dimension: u32) -> u32 {
    if max_texture_dimension >= 16_384 {
        2048
    } else if max_texture_dimension >= 8192 {
        1024
    } else {
        512
    }
}

/// Encode a point light's (decay, visibility, LOD) triple into one float:
/// `decay * 100 + visible * 10 + lod`.
///
/// Decay is clamped to [0, 3) and occupies the hundreds digit upward;
/// fractional decay would bleed into the visibility and LOD digits, so
/// hosts should keep decay to whole units.
#[must_use]
pub fn pack_point_params(decay: f32, visible: bool, lod: u8) -> f32 {
    let decay = decay.clamp(0.0, 2.99);
    decay * 100.0 + if visible { 10.0 } else { 0.0 } + f32::from(lod.min(3))
}

/// Decode [`pack_point_params`] the way the fragment shader does.
#[must_use]
pub fn unpack_point_params(packed: f32) -> (f32, bool, u8) {
    let u = packed.round() as u32;
    ((u / 100) as f32, (u / 10) % 2 == 1, (u % 10) as u8)
}

/// Encode a spot/rect light's (visibility, LOD) pair:
/// `visible * 10 + lod`.
#[must_use]
pub fn pack_vis_lod(visible: bool, lod: u8) -> f32 {
    (if visible { 10.0 } else { 0.0 }) + f32::from(lod.min(3))
}

/// Decode [`pack_vis_lod`] the way the fragment shader does.
#[must_use]
pub fn unpack_vis_lod(packed: f32) -> (bool, u8) {
    let u = packed.round() as u32;
    (u / 10 >= 1, (u % 10) as u8)
}

/// The CPU staging buffers for the three light parameter textures.
///
/// Buffers are reallocated only when a light count changes; per-frame
/// refreshes rewrite in place. The `reallocated` / `needs_upload` flags
/// tell the GPU layer when to recreate textures vs. merely re-upload.
pub struct PackedLightTextures {
    width: u32,

    point_data: Vec<f32>,
    point_size: [u32; 2],
    spot_data: Vec<f32>,
    spot_size: [u32; 2],
    rect_data: Vec<f32>,
    rect_size: [u32; 2],

    counts: [u32; 3],
    reallocated: bool,
    needs_upload: bool,
}

fn texel_count(size: [u32; 2]) -> usize {
    (size[0] * size[1]) as usize
}

impl PackedLightTextures {
    /// Create staging buffers for the given 2D texture width (see
    /// [`texture_width_for`]).
    #[must_use]
    pub fn new(width: u32) -> Self {
        let mut packed = Self {
            width,
            point_data: Vec::new(),
            point_size: [0, 0],
            spot_data: Vec::new(),
            spot_size: [0, 0],
            rect_data: Vec::new(),
            rect_size: [0, 0],
            counts: [0, 0, 0],
            reallocated: false,
            needs_upload: false,
        };
        packed.resize_buffers(0, 0, 0);
        packed
    }

    /// The chosen 2D texture width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Point texture dimensions in texels.
    #[must_use]
    pub fn point_size(&self) -> [u32; 2] {
        self.point_size
    }

    /// Spot texture dimensions in texels.
    #[must_use]
    pub fn spot_size(&self) -> [u32; 2] {
        self.spot_size
    }

    /// Rect texture dimensions in texels.
    #[must_use]
    pub fn rect_size(&self) -> [u32; 2] {
        self.rect_size
    }

    /// Raw point texture data (RGBA f32 per texel, row-major).
    #[must_use]
    pub fn point_data(&self) -> &[f32] {
        &self.point_data
    }

    /// Raw spot texture data.
    #[must_use]
    pub fn spot_data(&self) -> &[f32] {
        &self.spot_data
    }

    /// Raw rect texture data.
    #[must_use]
    pub fn rect_data(&self) -> &[f32] {
        &self.rect_data
    }

    /// One point-texture texel, for inspection and tests.
    #[must_use]
    pub fn point_texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = ((y * self.point_size[0] + x) * 4) as usize;
        [
            self.point_data[i],
            self.point_data[i + 1],
            self.point_data[i + 2],
            self.point_data[i + 3],
        ]
    }

    /// One spot-texture texel.
    #[must_use]
    pub fn spot_texel(&self, x: u32) -> [f32; 4] {
        let i = (x * 4) as usize;
        [
            self.spot_data[i],
            self.spot_data[i + 1],
            self.spot_data[i + 2],
            self.spot_data[i + 3],
        ]
    }

    /// One rect-texture texel.
    #[must_use]
    pub fn rect_texel(&self, x: u32) -> [f32; 4] {
        let i = (x * 4) as usize;
        [
            self.rect_data[i],
            self.rect_data[i + 1],
            self.rect_data[i + 2],
            self.rect_data[i + 3],
        ]
    }

    /// Whether any texture changed dimensions since the last
    /// [`mark_uploaded`](Self::mark_uploaded) (the GPU layer must recreate).
    #[must_use]
    pub fn reallocated(&self) -> bool {
        self.reallocated
    }

    /// Whether any texture data changed since the last upload.
    #[must_use]
    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    /// Clear the upload/reallocation flags after the GPU layer consumed the
    /// buffers.
    pub fn mark_uploaded(&mut self) {
        self.reallocated = false;
        self.needs_upload = false;
    }

    fn resize_buffers(&mut self, points: u32, spots: u32, rects: u32) {
        // Point records tile a width-wide rectangle; spot and rect records
        // are single rows.
        let point_rows =
            ((points * POINT_TEXELS).div_ceil(self.width)).max(1);
        let point_size = [self.width, point_rows];
        let spot_size = [(spots * SPOT_TEXELS).max(1), 1];
        let rect_size = [(rects * RECT_TEXELS).max(1), 1];

        if point_size != self.point_size
            || spot_size != self.spot_size
            || rect_size != self.rect_size
        {
            self.point_size = point_size;
            self.spot_size = spot_size;
            self.rect_size = rect_size;
            self.point_data.clear();
            self.point_data.resize(texel_count(point_size) * 4, 0.0);
            self.spot_data.clear();
            self.spot_data.resize(texel_count(spot_size) * 4, 0.0);
            self.rect_data.clear();
            self.rect_data.resize(texel_count(rect_size) * 4, 0.0);
            self.reallocated = true;
            log::debug!(
                "light texture layout: point {point_size:?}, spot \
                 {spot_size:?}, rect {rect_size:?}"
            );
        }
        self.counts = [points, spots, rects];
    }

    fn write_texel(data: &mut [f32], texel: usize, value: [f32; 4]) {
        data[texel * 4..texel * 4 + 4].copy_from_slice(&value);
    }

    /// Rewrite all three staging buffers from the store's post-animation,
    /// post-view-transform state. Resizes first when counts changed.
    pub fn repack(&mut self, store: &LightStore) {
        self.resize_buffers(
            store.point_count(),
            store.spot_count(),
            store.rect_count(),
        );

        for (i, light) in store.points().iter().enumerate() {
            let core = &light.core;
            let base = i * POINT_TEXELS as usize;
            let tinted = core.color * core.intensity;
            Self::write_texel(
                &mut self.point_data,
                base,
                [
                    core.view_position.x,
                    core.view_position.y,
                    core.view_position.z,
                    core.radius,
                ],
            );
            Self::write_texel(
                &mut self.point_data,
                base + 1,
                [
                    tinted.x,
                    tinted.y,
                    tinted.z,
                    pack_point_params(
                        core.decay,
                        core.shader_visible,
                        core.lod,
                    ),
                ],
            );
        }

        for (i, light) in store.spots().iter().enumerate() {
            let core = &light.core;
            let base = i * SPOT_TEXELS as usize;
            Self::write_texel(
                &mut self.spot_data,
                base,
                [
                    core.view_position.x,
                    core.view_position.y,
                    core.view_position.z,
                    core.radius,
                ],
            );
            Self::write_texel(
                &mut self.spot_data,
                base + 1,
                [core.color.x, core.color.y, core.color.z, core.intensity],
            );
            Self::write_texel(
                &mut self.spot_data,
                base + 2,
                [
                    light.view_direction.x,
                    light.view_direction.y,
                    light.view_direction.z,
                    0.0,
                ],
            );
            Self::write_texel(
                &mut self.spot_data,
                base + 3,
                [
                    light.cos_angle(),
                    light.cos_penumbra(),
                    core.decay,
                    pack_vis_lod(core.shader_visible, core.lod),
                ],
            );
        }

        for (i, light) in store.rects().iter().enumerate() {
            let core = &light.core;
            let base = i * RECT_TEXELS as usize;
            Self::write_texel(
                &mut self.rect_data,
                base,
                [
                    core.view_position.x,
                    core.view_position.y,
                    core.view_position.z,
                    core.radius,
                ],
            );
            Self::write_texel(
                &mut self.rect_data,
                base + 1,
                [core.color.x, core.color.y, core.color.z, core.intensity],
            );
            Self::write_texel(
                &mut self.rect_data,
                base + 2,
                [
                    light.width,
                    light.height,
                    core.decay,
                    pack_vis_lod(core.shader_visible, core.lod),
                ],
            );
            Self::write_texel(
                &mut self.rect_data,
                base + 3,
                [
                    light.view_normal.x,
                    light.view_normal.y,
                    light.view_normal.z,
                    0.0,
                ],
            );
            Self::write_texel(
                &mut self.rect_data,
                base + 4,
                [
                    light.view_tangent.x,
                    light.view_tangent.y,
                    light.view_tangent.z,
                    0.0,
                ],
            );
        }

        self.needs_upload = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{
        LightStore, PointLightDesc, RectLightDesc, SpotLightDesc,
    };
    use crate::options::EngineOptions;
    use crate::view::{apply_view_transform, CameraState};

    fn store() -> LightStore {
        LightStore::new(&EngineOptions {
            max_lights: 64,
            ..EngineOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_width_tiers() {
        assert_eq!(texture_width_for(16_384), 2048);
        assert_eq!(texture_width_for(32_768), 2048);
        assert_eq!(texture_width_for(8192), 1024);
        assert_eq!(texture_width_for(4096), 512);
    }

    #[test]
    fn test_point_params_round_trip() {
        for decay in [0u32, 1, 2] {
            for visible in [false, true] {
                for lod in 0u8..=3 {
                    let packed =
                        pack_point_params(decay as f32, visible, lod);
                    let (d, v, l) = unpack_point_params(packed);
                    assert!((d - decay as f32).abs() < 1e-4);
                    assert_eq!(v, visible);
                    assert_eq!(l, lod);
                }
            }
        }
    }

    #[test]
    fn test_vis_lod_round_trip() {
        for visible in [false, true] {
            for lod in 0u8..=3 {
                let (v, l) = unpack_vis_lod(pack_vis_lod(visible, lod));
                assert_eq!(v, visible);
                assert_eq!(l, lod);
            }
        }
    }

    #[test]
    fn test_point_record_layout() {
        let mut s = store();
        let _id = s
            .add_point(&PointLightDesc {
                position: glam::Vec3::new(0.0, 5.0, 0.0),
                color: glam::Vec3::new(1.0, 0.0, 0.0),
                intensity: 10.0,
                radius: 10.0,
                decay: 2.0,
                ..PointLightDesc::default()
            })
            .unwrap();
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);

        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);

        // Texel 0: view position + radius
        assert_eq!(packed.point_texel(0, 0), [0.0, 5.0, 0.0, 10.0]);
        // Texel 1: color * intensity + packed params
        // decay 2.0, visible, LOD 3 => 200 + 10 + 3
        assert_eq!(packed.point_texel(1, 0), [10.0, 0.0, 0.0, 213.0]);
    }

    #[test]
    fn test_invisible_light_drops_visibility_term() {
        let mut s = store();
        let _id = s
            .add_point(&PointLightDesc {
                position: glam::Vec3::new(0.0, 5.0, 0.0),
                color: glam::Vec3::new(1.0, 0.0, 0.0),
                intensity: 10.0,
                radius: 10.0,
                decay: 2.0,
                visible: false,
                ..PointLightDesc::default()
            })
            .unwrap();
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);

        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);
        assert_eq!(packed.point_texel(1, 0)[3], 203.0);
    }

    #[test]
    fn test_spot_record_layout() {
        let mut s = store();
        let _id = s
            .add_spot(&SpotLightDesc {
                position: glam::Vec3::new(0.0, 2.0, -5.0),
                direction: glam::Vec3::NEG_Y,
                angle: std::f32::consts::FRAC_PI_3,
                penumbra: 0.5,
                intensity: 4.0,
                ..SpotLightDesc::default()
            })
            .unwrap();
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);

        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);

        assert_eq!(packed.spot_texel(0), [0.0, 2.0, -5.0, 10.0]);
        assert_eq!(packed.spot_texel(1), [1.0, 1.0, 1.0, 4.0]);
        let dir = packed.spot_texel(2);
        assert!((dir[1] + 1.0).abs() < 1e-6);
        let params = packed.spot_texel(3);
        assert!((params[0] - 0.5).abs() < 1e-6); // cos(60 deg)
        assert!((params[1] - (std::f32::consts::FRAC_PI_6).cos()).abs() < 1e-6);
        assert_eq!(params[2], 2.0);
        assert_eq!(params[3], 13.0); // visible, LOD 3
    }

    #[test]
    fn test_rect_record_layout() {
        let mut s = store();
        let _id = s
            .add_rect(&RectLightDesc {
                position: glam::Vec3::new(1.0, 2.0, -8.0),
                normal: glam::Vec3::Z,
                width: 4.0,
                height: 2.0,
                ..RectLightDesc::default()
            })
            .unwrap();
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);

        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);

        assert_eq!(packed.rect_texel(0), [1.0, 2.0, -8.0, 10.0]);
        let size = packed.rect_texel(2);
        assert_eq!(&size[..2], &[4.0, 2.0]);
        assert_eq!(size[3], 13.0);
        let normal = packed.rect_texel(3);
        assert!((normal[2] - 1.0).abs() < 1e-6);
    }

    fn big_store() -> LightStore {
        LightStore::new(&EngineOptions {
            max_lights: 1024,
            ..EngineOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_realloc_only_on_count_change() {
        let mut s = big_store();
        let _a = s.add_point(&PointLightDesc::default()).unwrap();
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);

        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);
        assert!(packed.reallocated());
        packed.mark_uploaded();

        // Same counts: refresh in place
        packed.repack(&s);
        assert!(packed.needs_upload());
        assert!(!packed.reallocated());

        // Enough new lights to need another row: reallocate
        for _ in 0..300 {
            let _ = s.add_point(&PointLightDesc::default()).unwrap();
        }
        apply_view_transform(&mut s, &camera, 1.0);
        packed.repack(&s);
        assert!(packed.reallocated());
        assert_eq!(packed.point_size(), [512, 2]);
    }

    #[test]
    fn test_point_records_wrap_rows() {
        let mut s = big_store();
        // 300 lights * 2 texels = 600 texels > 512 wide row
        for i in 0..300 {
            let _ = s
                .add_point(&PointLightDesc {
                    position: glam::Vec3::new(i as f32, 0.0, 0.0),
                    ..PointLightDesc::default()
                })
                .unwrap();
        }
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut s, &camera, 1.0);
        let mut packed = PackedLightTextures::new(512);
        packed.repack(&s);

        // Record 256 starts at texel 512 = row 1, column 0
        let record = 256;
        let x = s.points()[record].core.view_position.x;
        assert_eq!(packed.point_texel(0, 1)[0], x);
    }
}
