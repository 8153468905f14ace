//! GLSL snippet assembly and host material patching.
//!
//! The engine does not own the host's PBR shader; it splices its cluster
//! traversal into it at two canonical markers and keeps a registry of
//! patched materials so uniform values and snippet variants stay current.
//! Marker insertion is plain substring work on the fragment source — the
//! markers themselves (the host's `#include` lines) are left intact.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::{IVec4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::error::CandelaError;

/// Marker after which the declaration chunk is inserted.
pub const PARS_MARKER: &str = "lights_physical_pars_fragment";
/// Marker after which the traversal chunk is inserted.
pub const BEGIN_MARKER: &str = "lights_fragment_begin";

/// Point-light count above which the ultra point-only snippet is used.
pub const ULTRA_POINT_THRESHOLD: u32 = 4096;

const PARS_CHUNK: &str =
    include_str!("../assets/shaders/material/clustered_pars.glsl");
const BEGIN_FULL: &str =
    include_str!("../assets/shaders/material/clustered_begin.glsl");
const BEGIN_POINTS: &str =
    include_str!("../assets/shaders/material/clustered_begin_points.glsl");
const BEGIN_POINTS_FAST: &str =
    include_str!("../assets/shaders/material/clustered_begin_points_fast.glsl");

/// Which traversal snippet a material gets, chosen from live light counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetVariant {
    /// Point + spot + rect dispatch with LOD tiers.
    Full,
    /// Point-only dispatch with LOD tiers.
    PointsOnly,
    /// Point-only, Lambert-only fast path for very dense scenes.
    PointsFast,
}

impl SnippetVariant {
    /// Select a variant for the given light counts.
    #[must_use]
    pub fn select(point: u32, spot: u32, rect: u32) -> Self {
        if spot + rect > 0 {
            Self::Full
        } else if point > ULTRA_POINT_THRESHOLD {
            Self::PointsFast
        } else {
            Self::PointsOnly
        }
    }

    fn begin_chunk(self) -> &'static str {
        match self {
            Self::Full => BEGIN_FULL,
            Self::PointsOnly => BEGIN_POINTS,
            Self::PointsFast => BEGIN_POINTS_FAST,
        }
    }
}

/// Engine-owned textures a patched material binds by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTexture {
    /// The packed point light records.
    PointLights,
    /// The packed spot light records.
    SpotLights,
    /// The packed rect light records.
    RectLights,
    /// The RGBA8 cluster list.
    ClusterList,
    /// The per-tile occupancy words.
    ClusterMaster,
    /// The optional 8x8 reduction.
    ClusterSuperMaster,
}

/// A uniform value the host must feed to its shader binding of the same
/// name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// A single float.
    Float(f32),
    /// A single int.
    Int(i32),
    /// A vec3.
    Vec3([f32; 3]),
    /// A vec4.
    Vec4([f32; 4]),
    /// An ivec4.
    IVec4([i32; 4]),
    /// A reference to an engine-owned texture (resolve through the
    /// engine's texture accessors).
    Texture(EngineTexture),
}

/// A host material's fragment shader plus the uniform set the engine wires
/// into it. The host owns compilation; the engine only rewrites the source
/// and keeps `uniforms` current.
#[derive(Debug)]
pub struct MaterialShader {
    /// GLSL fragment source containing the two canonical markers.
    pub fragment_source: String,
    /// Uniform name → current value, refreshed each engine update.
    pub uniforms: FxHashMap<String, UniformValue>,
}

impl MaterialShader {
    /// Wrap a host fragment shader source.
    #[must_use]
    pub fn new(fragment_source: impl Into<String>) -> Self {
        Self {
            fragment_source: fragment_source.into(),
            uniforms: FxHashMap::default(),
        }
    }
}

/// Per-frame uniform values shared by every patched material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterUniformValues {
    /// `clusterParams` (see the grid module).
    pub cluster_params: Vec4,
    /// `sliceParams`.
    pub slice_params: IVec4,
    /// `lightCounts` (point, spot, rect).
    pub light_counts: Vec3,
    /// `pointLightTextureWidth`.
    pub point_light_texture_width: i32,
    /// `maxTileSpan`.
    pub max_tile_span: f32,
}

struct PatchedEntry {
    material: Weak<RefCell<MaterialShader>>,
    original: String,
}

/// Splices the cluster snippet into host materials and keeps them in sync
/// with variant and uniform changes.
///
/// The patcher holds only weak references; dropping the engine leaves
/// patched materials valid but inert (their uniforms simply stop
/// updating).
pub struct MaterialPatcher {
    variant: SnippetVariant,
    super_master: bool,
    patched: Vec<PatchedEntry>,
}

fn inject_after(
    source: &str,
    marker: &'static str,
    chunk: &str,
) -> Result<String, CandelaError> {
    let at = source
        .find(marker)
        .ok_or(CandelaError::InvalidArgument(marker))?;
    let line_end = source[at..]
        .find('\n')
        .map_or(source.len(), |offset| at + offset + 1);
    let mut out = String::with_capacity(source.len() + chunk.len() + 2);
    out.push_str(&source[..line_end]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(chunk);
    out.push('\n');
    out.push_str(&source[line_end..]);
    Ok(out)
}

impl MaterialPatcher {
    /// New patcher; starts on the point-only variant until counts say
    /// otherwise.
    #[must_use]
    pub fn new(super_master: bool) -> Self {
        Self {
            variant: SnippetVariant::PointsOnly,
            super_master,
            patched: Vec::new(),
        }
    }

    /// The currently selected snippet variant.
    #[must_use]
    pub fn variant(&self) -> SnippetVariant {
        self.variant
    }

    /// The declaration chunk for the current configuration.
    #[must_use]
    pub fn pars_chunk(&self) -> String {
        if self.super_master {
            format!("#define CANDELA_SUPER_MASTER\n{PARS_CHUNK}")
        } else {
            PARS_CHUNK.to_owned()
        }
    }

    /// The traversal chunk for the current variant.
    #[must_use]
    pub fn begin_chunk(&self) -> &'static str {
        self.variant.begin_chunk()
    }

    /// Splice the current snippet into a fragment source.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::InvalidArgument`] naming the missing marker
    /// when the source lacks one of the two splice points.
    pub fn splice(&self, source: &str) -> Result<String, CandelaError> {
        let out = inject_after(source, PARS_MARKER, &self.pars_chunk())?;
        inject_after(&out, BEGIN_MARKER, self.begin_chunk())
    }

    /// Patch a material in place and register it for variant re-splices
    /// and uniform updates.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::InvalidArgument`] when the fragment source
    /// lacks a splice marker; the material is left untouched.
    pub fn patch(
        &mut self,
        material: &Rc<RefCell<MaterialShader>>,
    ) -> Result<(), CandelaError> {
        let original = material.borrow().fragment_source.clone();
        let spliced = self.splice(&original)?;
        {
            let mut m = material.borrow_mut();
            m.fragment_source = spliced;
            let _ = m.uniforms.insert(
                "pointLightTexture".to_owned(),
                UniformValue::Texture(EngineTexture::PointLights),
            );
            let _ = m.uniforms.insert(
                "spotLightTexture".to_owned(),
                UniformValue::Texture(EngineTexture::SpotLights),
            );
            let _ = m.uniforms.insert(
                "rectLightTexture".to_owned(),
                UniformValue::Texture(EngineTexture::RectLights),
            );
            let _ = m.uniforms.insert(
                "listTexture".to_owned(),
                UniformValue::Texture(EngineTexture::ClusterList),
            );
            let _ = m.uniforms.insert(
                "masterTexture".to_owned(),
                UniformValue::Texture(EngineTexture::ClusterMaster),
            );
            if self.super_master {
                let _ = m.uniforms.insert(
                    "superMasterTexture".to_owned(),
                    UniformValue::Texture(EngineTexture::ClusterSuperMaster),
                );
            }
        }
        self.patched.push(PatchedEntry {
            material: Rc::downgrade(material),
            original,
        });
        Ok(())
    }

    /// Re-select the snippet variant for the given counts, re-splicing
    /// every live material when it changed. Returns `true` on a change.
    pub fn refresh_variant(&mut self, point: u32, spot: u32, rect: u32) -> bool {
        let next = SnippetVariant::select(point, spot, rect);
        if next == self.variant {
            return false;
        }
        log::debug!(
            "snippet variant {:?} -> {next:?} (lights {point}/{spot}/{rect})",
            self.variant
        );
        self.variant = next;
        self.patched.retain(|entry| entry.material.strong_count() > 0);
        for entry in &self.patched {
            let Some(material) = entry.material.upgrade() else {
                continue;
            };
            match self.splice(&entry.original) {
                Ok(spliced) => {
                    material.borrow_mut().fragment_source = spliced;
                }
                Err(e) => log::warn!("variant re-splice failed: {e}"),
            }
        }
        true
    }

    /// Push the per-frame uniform values into every live patched material.
    pub fn write_uniforms(&self, values: &ClusterUniformValues) {
        for entry in &self.patched {
            let Some(material) = entry.material.upgrade() else {
                continue;
            };
            let mut m = material.borrow_mut();
            let _ = m.uniforms.insert(
                "clusterParams".to_owned(),
                UniformValue::Vec4(values.cluster_params.to_array()),
            );
            let _ = m.uniforms.insert(
                "sliceParams".to_owned(),
                UniformValue::IVec4(values.slice_params.to_array()),
            );
            let _ = m.uniforms.insert(
                "lightCounts".to_owned(),
                UniformValue::Vec3(values.light_counts.to_array()),
            );
            let _ = m.uniforms.insert(
                "pointLightTextureWidth".to_owned(),
                UniformValue::Int(values.point_light_texture_width),
            );
            let _ = m.uniforms.insert(
                "maxTileSpan".to_owned(),
                UniformValue::Float(values.max_tile_span),
            );
        }
    }

    /// Number of registered (possibly dropped) materials.
    #[must_use]
    pub fn patched_count(&self) -> usize {
        self.patched.len()
    }
}
