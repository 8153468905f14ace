//! Engine-owned GPU textures: the packed light parameter textures and the
//! cluster pipeline render targets.

use crate::cluster::ClusterGrid;
use crate::error::CandelaError;
use crate::packer::PackedLightTextures;

use super::GpuContext;

/// A texture and its default view.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a texture with the given size, format, and usage.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

fn check_dimension(
    what: &'static str,
    size: [u32; 2],
    limit: u32,
) -> Result<(), CandelaError> {
    let required = size[0].max(size[1]);
    if required > limit {
        Err(CandelaError::UnsupportedGpu {
            what,
            required,
            limit,
        })
    } else {
        Ok(())
    }
}

/// The three RGBA32F light parameter textures, recreated when a light
/// count changes and refreshed in place otherwise.
pub struct LightTextures {
    point: RenderTarget,
    spot: RenderTarget,
    rect: RenderTarget,
    point_size: [u32; 2],
    spot_size: [u32; 2],
    rect_size: [u32; 2],
}

const PARAM_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST);

impl LightTextures {
    /// Create the three textures sized to the packer's current layout.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::UnsupportedGpu`] when a required dimension
    /// exceeds the device limit (e.g. a huge single-row spot texture).
    pub fn new(
        context: &GpuContext,
        packed: &PackedLightTextures,
    ) -> Result<Self, CandelaError> {
        let limit = context.max_texture_dimension();
        check_dimension("point light texture", packed.point_size(), limit)?;
        check_dimension("spot light texture", packed.spot_size(), limit)?;
        check_dimension("rect light texture", packed.rect_size(), limit)?;

        let make = |label, size: [u32; 2]| {
            RenderTarget::new(
                &context.device,
                label,
                size,
                wgpu::TextureFormat::Rgba32Float,
                PARAM_USAGE,
            )
        };
        Ok(Self {
            point: make("Point Light Texture", packed.point_size()),
            spot: make("Spot Light Texture", packed.spot_size()),
            rect: make("Rect Light Texture", packed.rect_size()),
            point_size: packed.point_size(),
            spot_size: packed.spot_size(),
            rect_size: packed.rect_size(),
        })
    }

    /// Recreate any texture whose staging layout changed size. Returns
    /// `true` when textures were swapped (bind groups must be rebuilt).
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::UnsupportedGpu`] when a new dimension
    /// exceeds the device limit.
    pub fn ensure(
        &mut self,
        context: &GpuContext,
        packed: &PackedLightTextures,
    ) -> Result<bool, CandelaError> {
        if packed.point_size() == self.point_size
            && packed.spot_size() == self.spot_size
            && packed.rect_size() == self.rect_size
        {
            return Ok(false);
        }
        *self = Self::new(context, packed)?;
        Ok(true)
    }

    /// Upload all three staging buffers.
    pub fn upload(&self, queue: &wgpu::Queue, packed: &PackedLightTextures) {
        let write = |target: &RenderTarget, size: [u32; 2], data: &[f32]| {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &target.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(data),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size[0] * 16),
                    rows_per_image: Some(size[1]),
                },
                wgpu::Extent3d {
                    width: size[0],
                    height: size[1],
                    depth_or_array_layers: 1,
                },
            );
        };
        write(&self.point, self.point_size, packed.point_data());
        write(&self.spot, self.spot_size, packed.spot_data());
        write(&self.rect, self.rect_size, packed.rect_data());
    }

    /// View of the packed point records.
    #[must_use]
    pub fn point_view(&self) -> &wgpu::TextureView {
        &self.point.view
    }

    /// View of the packed spot records.
    #[must_use]
    pub fn spot_view(&self) -> &wgpu::TextureView {
        &self.spot.view
    }

    /// View of the packed rect records.
    #[must_use]
    pub fn rect_view(&self) -> &wgpu::TextureView {
        &self.rect.view
    }
}

/// The cluster pipeline's render targets, recreated on any grid or format
/// change.
pub struct ClusterTargets {
    /// RGBA8 cluster list target.
    pub list: RenderTarget,
    /// Per-tile occupancy word target (R8/R16/R32 uint by batch layout).
    pub master: RenderTarget,
    /// Optional 8x8 reduction target.
    pub super_master: Option<RenderTarget>,
    /// The master texture's uint format for pipeline creation.
    pub master_format: wgpu::TextureFormat,
}

const TARGET_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT
        .union(wgpu::TextureUsages::TEXTURE_BINDING);

impl ClusterTargets {
    /// Create the list/master (and optionally super-master) targets for a
    /// grid.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::UnsupportedGpu`] when the list or master
    /// dimensions exceed the device limit.
    pub fn new(
        context: &GpuContext,
        grid: &ClusterGrid,
        enable_super_master: bool,
    ) -> Result<Self, CandelaError> {
        let limit = context.max_texture_dimension();
        check_dimension("cluster list texture", grid.list_size(), limit)?;
        check_dimension("cluster master texture", grid.master_size(), limit)?;

        let master_format = grid.master_format();
        let list = RenderTarget::new(
            &context.device,
            "Cluster List",
            grid.list_size(),
            wgpu::TextureFormat::Rgba8Unorm,
            TARGET_USAGE,
        );
        let master = RenderTarget::new(
            &context.device,
            "Cluster Master",
            grid.master_size(),
            master_format,
            TARGET_USAGE,
        );
        let super_master = enable_super_master.then(|| {
            RenderTarget::new(
                &context.device,
                "Cluster Super Master",
                grid.super_master_size(),
                wgpu::TextureFormat::R8Uint,
                TARGET_USAGE,
            )
        });
        Ok(Self {
            list,
            master,
            super_master,
            master_format,
        })
    }
}
