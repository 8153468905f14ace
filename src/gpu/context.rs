//! The wgpu device/queue handle.

/// Owns clones of the host's wgpu device and queue plus a snapshot of the
/// device limits the engine sizes its textures against.
///
/// The engine never creates a device or surface itself; the host renderer
/// owns GPU initialization and hands its handles in.
pub struct GpuContext {
    /// The wgpu logical device.
    pub device: wgpu::Device,
    /// The wgpu command queue.
    pub queue: wgpu::Queue,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Wrap an externally-owned device and queue.
    #[must_use]
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            limits,
        }
    }

    /// The device limits snapshot.
    #[must_use]
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Largest supported 2D texture dimension.
    #[must_use]
    pub fn max_texture_dimension(&self) -> u32 {
        self.limits.max_texture_dimension_2d
    }

    /// Create a new command encoder for recording GPU commands.
    #[must_use]
    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cluster Light Encoder"),
            })
    }

    /// Finish the encoder and submit its command buffer to the GPU queue.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        let _ = self.queue.submit(std::iter::once(encoder.finish()));
    }
}
