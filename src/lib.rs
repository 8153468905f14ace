// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
// Documentation
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Unused / redundant code
#![warn(unused_qualifications)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
// GPU / graphics allowances: casts between texel indices, counts, and
// float parameters are pervasive and intentional
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
// Graphics math frequently compares against exact constants
#![allow(clippy::float_cmp)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]
// Tests may unwrap freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

//! GPU-accelerated clustered forward lighting engine built on wgpu.
//!
//! Candela shades scenes lit by tens of thousands of dynamic lights
//! (point, spot, rectangular area) with per-pixel cost bounded by the
//! lights that actually overlap a pixel's screen tile and depth slice. It
//! sits between a host 3D renderer — which owns the camera, geometry,
//! materials, and back buffer — and the GPU, producing:
//!
//! - three packed light-parameter textures (point/spot/rect records),
//! - a cluster → light-bitmask pyramid (list, master, optional
//!   super-master textures) built by instanced light-proxy rasterization,
//! - GLSL fragment chunks the host splices into its physically-based
//!   material to enumerate only the lights touching each fragment's
//!   cluster, with LOD-branched shading.
//!
//! # Key entry points
//!
//! - [`engine::CandelaEngine`] — light CRUD, the per-frame `update`, and
//!   host wiring
//! - [`material::MaterialShader`] / [`engine::CandelaEngine::patch_material`]
//!   — shader splicing and uniform wiring
//! - [`options::EngineOptions`] — capacity, cluster resolution, LOD bias,
//!   tile span
//!
//! # Per-frame data flow
//!
//! `update(time, camera)` evaluates light animations onto transient
//! fields, transforms lights to view space and classifies LOD 0-3,
//! refreshes the packed textures, then rasterizes each light's tile ×
//! slice footprint into the cluster list and reduces it to per-tile
//! occupancy words. Material fragments walk master → list → light records
//! for their cluster only.

pub mod animation;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod light;
pub mod material;
pub mod options;
pub mod packer;
pub mod view;

pub use engine::{CandelaEngine, FrameStats};
pub use error::CandelaError;
pub use light::{
    LightId, LightKind, PointLightDesc, RectLightDesc, SpotLightDesc,
};
pub use options::EngineOptions;
pub use view::CameraState;
