//! Light records and the public descriptors used to create them.

use glam::Vec3;

use crate::animation::AnimationDesc;

bitflags::bitflags! {
    /// Per-light dirty bits. Consumers (the texture packer) read and clear
    /// these to support incremental refresh.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        /// Base position changed.
        const POSITION = 1;
        /// Color or intensity changed.
        const COLOR = 2;
        /// Any other shading parameter changed.
        const PARAMS = 4;
        /// Everything changed (freshly added light).
        const ALL = 7;
    }
}

/// The three supported light variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Omnidirectional sphere-of-influence light.
    Point,
    /// Cone light with inner angle and penumbra falloff.
    Spot,
    /// Rectangular area light with an oriented frame.
    Rect,
}

impl LightKind {
    /// Wire code used by bulk-add kind arrays (0 / 1 / 2).
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Point => 0,
            Self::Spot => 1,
            Self::Rect => 2,
        }
    }

    /// Decode a bulk-add kind code. Unknown codes map to `None`.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Point),
            1 => Some(Self::Spot),
            2 => Some(Self::Rect),
            _ => None,
        }
    }
}

/// Stable handle the host uses to mutate or remove a light. Ids survive
/// internal re-sorting; they are never reused within an engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub(crate) u32);

impl LightId {
    /// Sentinel returned where an id slot must exist but no light does.
    pub const INVALID: Self = Self(u32::MAX);

    /// Whether this id refers to a light (it may still have been removed).
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Raw id value (useful for host-side tables).
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Where a light currently lives: its kind and its index within that kind's
/// array. Indices shift on removal and re-sorting; resolve through the
/// store's id table, never cache these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSlot {
    /// The light's variant.
    pub kind: LightKind,
    /// Index into the per-kind array.
    pub index: u32,
}

/// Fields shared by every light kind.
///
/// `base_*` fields are the canonical host-set values; the unprefixed
/// counterparts are the per-frame animated values the packer reads. For a
/// light with no animation they stay equal.
#[derive(Debug, Clone, Copy)]
pub struct LightCore {
    /// Stable global id.
    pub id: LightId,
    /// Canonical world position.
    pub base_position: Vec3,
    /// Animated world position (`base_position` + animation offsets).
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Canonical intensity.
    pub base_intensity: f32,
    /// Animated intensity.
    pub intensity: f32,
    /// Canonical sphere-of-influence radius.
    pub base_radius: f32,
    /// Animated radius.
    pub radius: f32,
    /// Distance falloff exponent, clamped to [0, 3) at packing time.
    pub decay: f32,
    /// Host-controlled visibility flag.
    pub visible: bool,
    /// Z-order code of the *base* position's (x, z); animation never
    /// perturbs it.
    pub morton: u32,
    /// Pending change bits for incremental texture refresh.
    pub dirty: DirtyFlags,
    /// Animation state.
    pub animation: AnimationDesc,
    /// View-space position (derived each frame).
    pub view_position: Vec3,
    /// Shading quality tier 0-3 (derived each frame; 0 = skipped).
    pub lod: u8,
    /// `visible` merged with the near/far depth test (derived each frame).
    pub shader_visible: bool,
}

impl LightCore {
    pub(crate) fn new(
        id: LightId,
        position: Vec3,
        color: Vec3,
        intensity: f32,
        radius: f32,
        decay: f32,
        visible: bool,
        animation: AnimationDesc,
    ) -> Self {
        Self {
            id,
            base_position: position,
            position,
            color,
            base_intensity: intensity,
            intensity,
            base_radius: radius,
            radius,
            decay,
            visible,
            morton: super::morton::morton_for(position),
            dirty: DirtyFlags::ALL,
            animation,
            view_position: Vec3::ZERO,
            lod: 3,
            shader_visible: visible,
        }
    }

    /// Re-derive the Morton code after a base-position change.
    pub(crate) fn refresh_morton(&mut self) {
        self.morton = super::morton::morton_for(self.base_position);
    }
}

/// A point light record.
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    /// Shared light state.
    pub core: LightCore,
}

/// A spot light record.
#[derive(Debug, Clone, Copy)]
pub struct SpotLight {
    /// Shared light state.
    pub core: LightCore,
    /// Canonical cone direction (unit).
    pub base_direction: Vec3,
    /// Animated cone direction.
    pub direction: Vec3,
    /// View-space cone direction (derived each frame).
    pub view_direction: Vec3,
    /// Cone half-angle in radians.
    pub angle: f32,
    /// Penumbra width in [0, 1]; 0 = hard edge.
    pub penumbra: f32,
}

impl SpotLight {
    /// Cosine of the cone half-angle, as packed for the GPU.
    #[must_use]
    pub fn cos_angle(&self) -> f32 {
        self.angle.cos()
    }

    /// Cosine of the inner (pre-penumbra) angle, as packed for the GPU.
    #[must_use]
    pub fn cos_penumbra(&self) -> f32 {
        (self.angle * (1.0 - self.penumbra)).cos()
    }
}

/// A rectangular area light record.
#[derive(Debug, Clone, Copy)]
pub struct RectLight {
    /// Shared light state.
    pub core: LightCore,
    /// Rectangle width in world units.
    pub width: f32,
    /// Rectangle height in world units.
    pub height: f32,
    /// Canonical surface normal (unit).
    pub base_normal: Vec3,
    /// Canonical tangent, orthonormal to the normal.
    pub base_tangent: Vec3,
    /// Canonical bitangent completing the frame.
    pub base_bitangent: Vec3,
    /// Animated normal.
    pub normal: Vec3,
    /// Animated tangent.
    pub tangent: Vec3,
    /// Animated bitangent.
    pub bitangent: Vec3,
    /// View-space normal (derived each frame).
    pub view_normal: Vec3,
    /// View-space tangent (derived each frame).
    pub view_tangent: Vec3,
}

/// Build an orthonormal (tangent, bitangent) pair for a unit normal.
#[must_use]
pub fn orthonormal_frame(normal: Vec3) -> (Vec3, Vec3) {
    let helper = if normal.y.abs() < 0.999 {
        Vec3::Y
    } else {
        Vec3::X
    };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

/// Parameters for creating a point light.
#[derive(Debug, Clone, Copy)]
pub struct PointLightDesc {
    /// World position.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Sphere-of-influence radius.
    pub radius: f32,
    /// Distance falloff exponent.
    pub decay: f32,
    /// Initial visibility.
    pub visible: bool,
    /// Animation state.
    pub animation: AnimationDesc,
}

impl Default for PointLightDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            decay: 2.0,
            visible: true,
            animation: AnimationDesc::none(),
        }
    }
}

/// Parameters for creating a spot light.
#[derive(Debug, Clone, Copy)]
pub struct SpotLightDesc {
    /// World position.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Sphere-of-influence radius.
    pub radius: f32,
    /// Distance falloff exponent.
    pub decay: f32,
    /// Initial visibility.
    pub visible: bool,
    /// Cone direction (normalized on add; degenerate input falls back
    /// to -Y).
    pub direction: Vec3,
    /// Cone half-angle in radians.
    pub angle: f32,
    /// Penumbra width in [0, 1].
    pub penumbra: f32,
    /// Animation state.
    pub animation: AnimationDesc,
}

impl Default for SpotLightDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            decay: 2.0,
            visible: true,
            direction: Vec3::NEG_Y,
            angle: std::f32::consts::FRAC_PI_4,
            penumbra: 0.1,
            animation: AnimationDesc::none(),
        }
    }
}

/// Parameters for creating a rectangular area light.
#[derive(Debug, Clone, Copy)]
pub struct RectLightDesc {
    /// World position of the rectangle center.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Sphere-of-influence radius.
    pub radius: f32,
    /// Distance falloff exponent.
    pub decay: f32,
    /// Initial visibility.
    pub visible: bool,
    /// Surface normal (normalized on add; degenerate input falls back
    /// to +Z).
    pub normal: Vec3,
    /// Rectangle width in world units.
    pub width: f32,
    /// Rectangle height in world units.
    pub height: f32,
    /// Animation state.
    pub animation: AnimationDesc,
}

impl Default for RectLightDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            decay: 2.0,
            visible: true,
            normal: Vec3::Z,
            width: 2.0,
            height: 1.0,
            animation: AnimationDesc::none(),
        }
    }
}
