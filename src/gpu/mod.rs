//! GPU resource plumbing: the device/queue handle the host supplies and
//! the engine-owned textures and render targets.

mod context;
mod textures;

pub use context::GpuContext;
pub use textures::{ClusterTargets, LightTextures, RenderTarget};
