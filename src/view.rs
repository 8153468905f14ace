//! View-space transform, LOD classification, and near/far culling.
//!
//! Runs after animation and before texture packing. The view matrix rows
//! are extracted once per frame; positions transform as points, directions
//! and normals as renormalized directions.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::light::LightStore;

/// Camera state the host hands the engine each frame. The engine never owns
/// a camera; it only consumes the matrices.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    /// World → view matrix.
    pub view: Mat4,
    /// View → clip matrix.
    pub projection: Mat4,
    /// Near plane distance (positive).
    pub znear: f32,
    /// Far plane distance (positive).
    pub zfar: f32,
    /// Back-buffer size in pixels.
    pub viewport: [u32; 2],
}

impl CameraState {
    /// Identity camera looking down -Z, useful for tests and warm-up frames.
    #[must_use]
    pub fn identity(viewport: [u32; 2], znear: f32, zfar: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(
                std::f32::consts::FRAC_PI_3,
                viewport[0] as f32 / viewport[1] as f32,
                znear,
                zfar,
            ),
            znear,
            zfar,
            viewport,
        }
    }

    /// The projection matrix diagonal (x/y focal scales) used by the sphere
    /// projection.
    #[must_use]
    pub fn proj_scale(&self) -> Vec2 {
        Vec2::new(self.projection.x_axis.x, self.projection.y_axis.y)
    }
}

/// The top three rows of a view matrix, cached once per frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewRows {
    rows: [Vec4; 3],
}

impl ViewRows {
    /// Extract rows 0-2 from a column-major view matrix.
    #[must_use]
    pub fn new(view: &Mat4) -> Self {
        let t = view.transpose();
        Self {
            rows: [t.x_axis, t.y_axis, t.z_axis],
        }
    }

    /// Transform a world position into view space.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let p = p.extend(1.0);
        Vec3::new(
            self.rows[0].dot(p),
            self.rows[1].dot(p),
            self.rows[2].dot(p),
        )
    }

    /// Transform a world direction into view space (no translation),
    /// renormalized. Degenerate input maps to zero.
    #[inline]
    #[must_use]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        let d = d.extend(0.0);
        Vec3::new(
            self.rows[0].dot(d),
            self.rows[1].dot(d),
            self.rows[2].dot(d),
        )
        .normalize_or_zero()
    }
}

/// Shading quality tier from view depth and radius. `0` means the light is
/// skipped entirely; `3` runs the host's full BRDF.
#[must_use]
pub fn classify_lod(view_z: f32, radius: f32, lod_bias: f32) -> u8 {
    let r = radius * lod_bias;
    if r <= 0.0 {
        return 0;
    }
    let ratio = -view_z / r;
    if ratio > 30.0 {
        0
    } else if ratio > 15.0 {
        1
    } else if ratio > 7.0 {
        2
    } else {
        3
    }
}

/// Whether a view-space sphere overlaps the [near, far] depth band.
#[inline]
fn in_depth_range(view_z: f32, radius: f32, znear: f32, zfar: f32) -> bool {
    view_z - radius < -znear && view_z + radius > -zfar
}

/// Transform every light into view space, classify its LOD, and merge the
/// near/far test into its effective visibility.
pub fn apply_view_transform(
    store: &mut LightStore,
    camera: &CameraState,
    lod_bias: f32,
) {
    let rows = ViewRows::new(&camera.view);
    let (znear, zfar) = (camera.znear, camera.zfar);

    for light in store.points_mut() {
        let core = &mut light.core;
        core.view_position = rows.transform_point(core.position);
        core.lod = classify_lod(core.view_position.z, core.radius, lod_bias);
        core.shader_visible = core.visible
            && in_depth_range(core.view_position.z, core.radius, znear, zfar);
    }

    for light in store.spots_mut() {
        let core = &mut light.core;
        core.view_position = rows.transform_point(core.position);
        core.lod = classify_lod(core.view_position.z, core.radius, lod_bias);
        core.shader_visible = core.visible
            && in_depth_range(core.view_position.z, core.radius, znear, zfar);
        light.view_direction = rows.transform_direction(light.direction);
    }

    for light in store.rects_mut() {
        let core = &mut light.core;
        core.view_position = rows.transform_point(core.position);
        core.lod = classify_lod(core.view_position.z, core.radius, lod_bias);
        core.shader_visible = core.visible
            && in_depth_range(core.view_position.z, core.radius, znear, zfar);
        light.view_normal = rows.transform_direction(light.normal);
        light.view_tangent = rows.transform_direction(light.tangent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{LightStore, PointLightDesc, SpotLightDesc};
    use crate::options::EngineOptions;

    #[test]
    fn test_identity_view_passes_positions_through() {
        let rows = ViewRows::new(&Mat4::IDENTITY);
        let p = Vec3::new(1.0, 2.0, -3.0);
        assert_eq!(rows.transform_point(p), p);
        assert_eq!(rows.transform_direction(Vec3::X), Vec3::X);
    }

    #[test]
    fn test_translated_view() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
        let rows = ViewRows::new(&view);
        // A point at the world origin sits 10 units in front of the camera
        assert_eq!(
            rows.transform_point(Vec3::ZERO),
            Vec3::new(0.0, 0.0, -10.0)
        );
        // Directions ignore translation
        assert_eq!(rows.transform_direction(Vec3::Y), Vec3::Y);
    }

    #[test]
    fn test_lod_thresholds() {
        // radius 1, bias 1: tier boundaries at depth 7, 15, 30
        assert_eq!(classify_lod(-5.0, 1.0, 1.0), 3);
        assert_eq!(classify_lod(-8.0, 1.0, 1.0), 2);
        assert_eq!(classify_lod(-16.0, 1.0, 1.0), 1);
        assert_eq!(classify_lod(-31.0, 1.0, 1.0), 0);
        // Bias scales the effective radius
        assert_eq!(classify_lod(-31.0, 1.0, 2.0), 1);
    }

    #[test]
    fn test_lod_monotonic_with_depth() {
        let mut last = 3;
        for step in 0..200 {
            let z = -(step as f32) * 0.5;
            let lod = classify_lod(z, 2.0, 1.0);
            assert!(
                lod <= last,
                "LOD must not increase with depth (z={z}, lod={lod})"
            );
            last = lod;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_near_far_merges_into_visibility() {
        let options = EngineOptions {
            max_lights: 8,
            ..EngineOptions::default()
        };
        let mut store = LightStore::new(&options).unwrap();
        let in_front = store
            .add_point(&PointLightDesc {
                position: Vec3::new(0.0, 0.0, -20.0),
                radius: 5.0,
                ..PointLightDesc::default()
            })
            .unwrap();
        let behind = store
            .add_point(&PointLightDesc {
                position: Vec3::new(0.0, 0.0, 50.0),
                radius: 5.0,
                ..PointLightDesc::default()
            })
            .unwrap();
        let hidden = store
            .add_point(&PointLightDesc {
                position: Vec3::new(0.0, 0.0, -20.0),
                radius: 5.0,
                visible: false,
                ..PointLightDesc::default()
            })
            .unwrap();

        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        apply_view_transform(&mut store, &camera, 1.0);

        assert!(store.light_core(in_front).unwrap().shader_visible);
        assert!(!store.light_core(behind).unwrap().shader_visible);
        assert!(!store.light_core(hidden).unwrap().shader_visible);
    }

    #[test]
    fn test_spot_direction_transforms_as_direction() {
        let options = EngineOptions {
            max_lights: 8,
            ..EngineOptions::default()
        };
        let mut store = LightStore::new(&options).unwrap();
        let id = store
            .add_spot(&SpotLightDesc {
                position: Vec3::new(0.0, 5.0, -10.0),
                direction: Vec3::NEG_Y,
                ..SpotLightDesc::default()
            })
            .unwrap();

        // Camera rotated a quarter turn about Y: world -Y stays -Y
        let mut camera = CameraState::identity([800, 600], 0.1, 100.0);
        camera.view = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        apply_view_transform(&mut store, &camera, 1.0);

        let spot = store.spot(id).unwrap();
        assert!((spot.view_direction - Vec3::NEG_Y).length() < 1e-5);
        assert!((spot.view_direction.length() - 1.0).abs() < 1e-5);
    }
}
