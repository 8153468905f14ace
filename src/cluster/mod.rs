//! The cluster grid: screen tiles × logarithmic depth slices, and the
//! batch layout that maps lights onto the list/master texture rows.
//!
//! Lights group in 32s (one RGBA8 list texel per group per cluster).
//! Groups pack into master words of `groups_per_word` bits; `nw` master
//! rows per tile row cover the whole light range. All texture dimensions
//! and the uniform parameter blocks derive from this module.

pub mod math;
pub(crate) mod passes;

use glam::{IVec4, Vec4};

use crate::view::CameraState;

/// Screen-tile and depth-slice subdivision of the view frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterResolution {
    /// Screen tiles across.
    pub x: u32,
    /// Screen tiles down.
    pub y: u32,
    /// Logarithmic depth slices.
    pub z: u32,
}

impl ClusterResolution {
    /// Pick a resolution for the live light count. Small scenes get a
    /// coarser grid; the dense tiers match the engine's design targets.
    #[must_use]
    pub fn for_light_count(total: u32) -> Self {
        if total <= 64 {
            Self { x: 16, y: 8, z: 16 }
        } else if total <= 1024 {
            Self {
                x: 24,
                y: 12,
                z: 24,
            }
        } else {
            Self {
                x: 32,
                y: 16,
                z: 32,
            }
        }
    }

    /// Total cluster count.
    #[must_use]
    pub fn cluster_count(&self) -> u32 {
        self.x * self.y * self.z
    }
}

/// Everything derived from (resolution, light count): batch sizing, texture
/// dimensions, and the master texture's integer format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterGrid {
    /// The tile/slice subdivision.
    pub resolution: ClusterResolution,
    /// Lights covered by one master row (512, or 1024 past 8000 lights).
    pub batch_size: u32,
    /// Bits used per master texel (`batch_size / 32`).
    pub groups_per_word: u32,
    /// Master rows per tile row.
    pub nw: u32,
    /// 32-light groups addressable in the list texture
    /// (`nw * groups_per_word`, i.e. the group count padded to whole
    /// master words).
    pub padded_groups: u32,
    /// The light count this grid was built for.
    pub light_count: u32,
}

impl ClusterGrid {
    /// Build the grid for a light count.
    #[must_use]
    pub fn new(resolution: ClusterResolution, light_count: u32) -> Self {
        let batch_size = if light_count > 8000 { 1024 } else { 512 };
        let groups_per_word = batch_size / 32;
        let nw = light_count.div_ceil(batch_size).max(1);
        Self {
            resolution,
            batch_size,
            groups_per_word,
            nw,
            padded_groups: nw * groups_per_word,
            light_count,
        }
    }

    /// The `clusterParams` uniform:
    /// `(Nx/W, Ny/H, Nz/ln(far/near), Nz*ln(near)/ln(far/near))`.
    #[must_use]
    pub fn cluster_params(&self, camera: &CameraState) -> Vec4 {
        let log_fn = (camera.zfar / camera.znear).ln();
        Vec4::new(
            self.resolution.x as f32 / camera.viewport[0] as f32,
            self.resolution.y as f32 / camera.viewport[1] as f32,
            self.resolution.z as f32 / log_fn,
            self.resolution.z as f32 * camera.znear.ln() / log_fn,
        )
    }

    /// The `sliceParams` uniform: `(Nx, Ny, Nz, Nw)`.
    #[must_use]
    pub fn slice_params(&self) -> IVec4 {
        IVec4::new(
            self.resolution.x as i32,
            self.resolution.y as i32,
            self.resolution.z as i32,
            self.nw as i32,
        )
    }

    /// List texture dimensions: `Nx*Nz` wide, one row per (tile row,
    /// group) pair.
    #[must_use]
    pub fn list_size(&self) -> [u32; 2] {
        [
            self.resolution.x * self.resolution.z,
            self.resolution.y * self.padded_groups,
        ]
    }

    /// Master texture dimensions: `Nx*Nz` wide, `Ny*Nw` tall.
    #[must_use]
    pub fn master_size(&self) -> [u32; 2] {
        [
            self.resolution.x * self.resolution.z,
            self.resolution.y * self.nw,
        ]
    }

    /// Super-master texture dimensions: the master grid reduced 8x on both
    /// axes.
    #[must_use]
    pub fn super_master_size(&self) -> [u32; 2] {
        let [w, h] = self.master_size();
        [w.div_ceil(8), h.div_ceil(8)]
    }

    /// Unsigned-integer texture format for the master words: the narrowest
    /// format that holds `groups_per_word` bits.
    #[must_use]
    pub fn master_format(&self) -> wgpu::TextureFormat {
        if self.groups_per_word > 16 {
            wgpu::TextureFormat::R32Uint
        } else if self.groups_per_word > 8 {
            wgpu::TextureFormat::R16Uint
        } else {
            wgpu::TextureFormat::R8Uint
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        assert_eq!(
            ClusterResolution::for_light_count(10),
            ClusterResolution { x: 16, y: 8, z: 16 }
        );
        assert_eq!(
            ClusterResolution::for_light_count(5000),
            ClusterResolution {
                x: 32,
                y: 16,
                z: 32
            }
        );
    }

    #[test]
    fn test_batch_sizing() {
        let grid = ClusterGrid::new(ClusterResolution::for_light_count(100), 100);
        assert_eq!(grid.batch_size, 512);
        assert_eq!(grid.groups_per_word, 16);
        assert_eq!(grid.nw, 1);
        assert_eq!(grid.master_format(), wgpu::TextureFormat::R16Uint);

        let grid =
            ClusterGrid::new(ClusterResolution::for_light_count(10_000), 10_000);
        assert_eq!(grid.batch_size, 1024);
        assert_eq!(grid.groups_per_word, 32);
        assert_eq!(grid.nw, 10);
        assert_eq!(grid.master_format(), wgpu::TextureFormat::R32Uint);
    }

    #[test]
    fn test_texture_dimensions() {
        let resolution = ClusterResolution {
            x: 32,
            y: 16,
            z: 32,
        };
        let grid = ClusterGrid::new(resolution, 2048);
        // 2048 lights: 4 batch rows of 512, 16 groups per word
        assert_eq!(grid.nw, 4);
        assert_eq!(grid.master_size(), [32 * 32, 16 * 4]);
        assert_eq!(grid.list_size(), [32 * 32, 16 * 64]);
        assert_eq!(grid.super_master_size(), [128, 8]);
    }

    #[test]
    fn test_zero_lights_keeps_one_row() {
        let grid =
            ClusterGrid::new(ClusterResolution::for_light_count(0), 0);
        assert_eq!(grid.nw, 1);
        assert!(grid.list_size()[1] > 0);
    }

    #[test]
    fn test_cluster_params_match_slice_formula() {
        use crate::view::CameraState;
        let camera = CameraState::identity([1280, 720], 0.1, 1000.0);
        let grid = ClusterGrid::new(
            ClusterResolution {
                x: 32,
                y: 16,
                z: 32,
            },
            100,
        );
        let params = grid.cluster_params(&camera);
        assert!((params.x - 32.0 / 1280.0).abs() < 1e-7);
        assert!((params.y - 16.0 / 720.0).abs() < 1e-7);
        // Slice 0 starts exactly at the near plane
        let slice0 = 0.1f32.ln() * params.z - params.w;
        assert!(slice0.abs() < 1e-4);
        // The far plane maps to Nz
        let slice_far = 1000.0f32.ln() * params.z - params.w;
        assert!((slice_far - 32.0).abs() < 1e-3);
    }
}
