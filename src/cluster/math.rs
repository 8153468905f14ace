//! CPU mirror of the cluster-space math the GPU passes run.
//!
//! The list pass vertex shader computes each light's tile/slice footprint
//! on the GPU; this module holds the same formulas for resolution policy,
//! frame statistics, and verification. Any change here must be reflected in
//! `assets/shaders/cluster/list.wgsl` and the material traversal chunks.

use glam::{Vec3, Vec4};

use super::ClusterGrid;
use crate::view::CameraState;

/// Depth slice index for a positive view-space depth, from the
/// `clusterParams` uniform: `floor(ln(d) * params.z - params.w)`.
#[inline]
#[must_use]
pub fn depth_slice(depth: f32, cluster_params: Vec4) -> i32 {
    (depth.ln() * cluster_params.z - cluster_params.w).floor() as i32
}

/// Tile index for an NDC coordinate in [-1, 1], clamped into the grid.
#[inline]
#[must_use]
pub fn ndc_to_tile(ndc: f32, tiles: i32) -> i32 {
    (((ndc * 0.5 + 0.5) * tiles as f32).floor() as i32).clamp(0, tiles - 1)
}

/// Projected screen extent of a view-space sphere along one axis.
///
/// `a` is the lateral view coordinate (x or y), `z` the view depth
/// (negative in front of the camera), `r` the radius, and `scale` the
/// matching projection diagonal entry. Rotates the unit view vector by
/// ±asin(r / ‖(a·0.1, z)‖) — the damped lateral term widens the bound near
/// the screen edges — and projects both tangent directions. Returns the
/// full [-1, 1] extent when the sphere engulfs the viewpoint or crosses
/// the near plane.
#[must_use]
pub fn project_sphere_extent(a: f32, z: f32, r: f32, scale: f32) -> (f32, f32) {
    let dist = (a * 0.1).hypot(z);
    if dist <= r {
        return (-1.0, 1.0);
    }
    let len = a.hypot(z);
    if len <= 1e-6 {
        return (-1.0, 1.0);
    }

    let t = (r / dist).clamp(-1.0, 1.0).asin();
    let (ux, uz) = (a / len, z / len);
    let (s, c) = t.sin_cos();
    let (pa, pz) = (ux * c - uz * s, ux * s + uz * c);
    let (qa, qz) = (ux * c + uz * s, -ux * s + uz * c);

    let project = |a: f32, z: f32| -> Option<f32> {
        if z < -1e-6 {
            Some(scale * a / -z)
        } else {
            None
        }
    };
    match (project(pa, pz), project(qa, qz)) {
        (Some(p), Some(q)) => {
            (p.min(q).clamp(-1.0, 1.0), p.max(q).clamp(-1.0, 1.0))
        }
        _ => (-1.0, 1.0),
    }
}

/// Inclusive cluster-space bounding box of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterBounds {
    /// First covered tile column.
    pub x0: i32,
    /// Last covered tile column.
    pub x1: i32,
    /// First covered tile row.
    pub y0: i32,
    /// Last covered tile row.
    pub y1: i32,
    /// First covered depth slice.
    pub z0: i32,
    /// Last covered depth slice.
    pub z1: i32,
}

impl ClusterBounds {
    /// Whether a cluster cell lies inside these bounds.
    #[must_use]
    pub fn contains(&self, tx: i32, ty: i32, tz: i32) -> bool {
        tx >= self.x0
            && tx <= self.x1
            && ty >= self.y0
            && ty <= self.y1
            && tz >= self.z0
            && tz <= self.z1
    }
}

/// The tile/slice footprint of a view-space sphere, or `None` when it is
/// fully outside the depth band or the screen.
///
/// `max_tile_span` caps how many tiles the footprint may cover per axis
/// (centered on the light's projected center), bounding the worst-case
/// rasterization cost of a huge nearby light.
#[must_use]
pub fn light_cluster_bounds(
    view_pos: Vec3,
    radius: f32,
    camera: &CameraState,
    grid: &ClusterGrid,
    max_tile_span: f32,
) -> Option<ClusterBounds> {
    let nx = grid.resolution.x as i32;
    let ny = grid.resolution.y as i32;
    let nz = grid.resolution.z as i32;

    if view_pos.z - radius > -camera.znear
        || view_pos.z + radius < -camera.zfar
    {
        return None;
    }

    let scale = camera.proj_scale();
    let (lx, hx) = project_sphere_extent(view_pos.x, view_pos.z, radius, scale.x);
    let (ly, hy) = project_sphere_extent(view_pos.y, view_pos.z, radius, scale.y);
    if hx <= -1.0 || lx >= 1.0 || hy <= -1.0 || ly >= 1.0 {
        return None;
    }

    let mut x0 = ndc_to_tile(lx, nx);
    let mut x1 = ndc_to_tile(hx, nx);
    let mut y0 = ndc_to_tile(ly, ny);
    let mut y1 = ndc_to_tile(hy, ny);

    let span = max_tile_span.clamp(8.0, 32.0) as i32;
    if x1 - x0 + 1 > span || y1 - y0 + 1 > span {
        let cz = view_pos.z.min(-camera.znear);
        let cx = ndc_to_tile((scale.x * view_pos.x / -cz).clamp(-1.0, 1.0), nx);
        let cy = ndc_to_tile((scale.y * view_pos.y / -cz).clamp(-1.0, 1.0), ny);
        let half = span / 2;
        x0 = x0.max(cx - half);
        x1 = x1.min(cx + half);
        y0 = y0.max(cy - half);
        y1 = y1.min(cy + half);
    }

    let params = grid.cluster_params(camera);
    let d = -view_pos.z;
    let near_depth = camera.znear * (1.0 + 1e-4);
    let z0 = depth_slice((d - radius).max(near_depth), params).clamp(0, nz - 1);
    let z1 = depth_slice((d + radius).max(near_depth), params).clamp(0, nz - 1);

    Some(ClusterBounds {
        x0,
        x1,
        y0,
        y1,
        z0,
        z1,
    })
}
