//! Procedural light animation.
//!
//! Each light carries a fixed-size [`AnimationDesc`]: a flags bitmask
//! selecting which sub-animations are active plus one parameter struct per
//! sub-animation. Position offsets compose additively
//! (circular → linear → wave), intensity/radius modulation composes
//! multiplicatively (flicker → pulse), and rotation applies last to spot
//! directions and rect frames. The evaluator in [`eval`] recomputes every
//! transient field from the base fields each frame, so evaluation is
//! idempotent with respect to the stored canonical data.

mod eval;

pub use eval::evaluate_store;

use glam::Vec3;

bitflags::bitflags! {
    /// Which sub-animations a light runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AnimationFlags: u32 {
        /// Horizontal orbit of the base position (point lights only).
        const CIRCULAR = 1 << 0;
        /// Interpolated offset toward a target position.
        const LINEAR = 1 << 1;
        /// Sinusoidal offset along a fixed axis.
        const WAVE = 1 << 2;
        /// Pseudo-random intensity modulation.
        const FLICKER = 1 << 3;
        /// Sinusoidal intensity and/or radius modulation.
        const PULSE = 1 << 4;
        /// Orientation spin for spot directions and rect frames; also
        /// orbits the current position about the rotation axis.
        const ROTATE = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Which light properties a pulse animation modulates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PulseTarget: u32 {
        /// Modulate the light's intensity.
        const INTENSITY = 1 << 0;
        /// Modulate the light's influence radius.
        const RADIUS = 1 << 1;
    }
}

/// How a linear animation treats time past its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearMode {
    /// Clamp at the target and stay there.
    #[default]
    Once,
    /// Wrap back to the start each period.
    Loop,
    /// Bounce between start and target.
    PingPong,
}

impl LinearMode {
    fn code(self) -> f32 {
        match self {
            Self::Once => 0.0,
            Self::Loop => 1.0,
            Self::PingPong => 2.0,
        }
    }

    fn from_code(code: f32) -> Self {
        match code as u32 {
            1 => Self::Loop,
            2 => Self::PingPong,
            _ => Self::Once,
        }
    }
}

/// Whether a rotation spins continuously or swings back and forth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotateMode {
    /// Constant angular velocity, angle wraps at 2π.
    #[default]
    Continuous,
    /// Sinusoidal swing with a maximum deflection angle.
    Swing,
}

impl RotateMode {
    fn code(self) -> f32 {
        match self {
            Self::Continuous => 0.0,
            Self::Swing => 1.0,
        }
    }

    fn from_code(code: f32) -> Self {
        if code as u32 == 1 {
            Self::Swing
        } else {
            Self::Continuous
        }
    }
}

/// Horizontal orbit parameters. The offset traces a circle in the XZ plane;
/// Y is left untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularAnim {
    /// Angular speed in radians per second.
    pub speed: f32,
    /// Orbit radius in world units.
    pub radius: f32,
}

impl Default for CircularAnim {
    fn default() -> Self {
        Self {
            speed: 1.0,
            radius: 1.0,
        }
    }
}

/// Interpolated offset toward a world-space target. Activates once `t`
/// reaches `delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearAnim {
    /// World-space position interpolated toward.
    pub target: Vec3,
    /// Seconds the interpolation takes.
    pub duration: f32,
    /// Seconds before the interpolation starts.
    pub delay: f32,
    /// End-of-duration behavior.
    pub mode: LinearMode,
}

impl Default for LinearAnim {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            duration: 1.0,
            delay: 0.0,
            mode: LinearMode::Once,
        }
    }
}

/// Sinusoidal positional offset along an axis. The axis is normalized when
/// the animation is attached to a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveAnim {
    /// Offset direction (unit length once attached).
    pub axis: Vec3,
    /// Oscillation speed in radians per second.
    pub speed: f32,
    /// Peak offset in world units.
    pub amplitude: f32,
    /// Phase offset in radians.
    pub phase: f32,
}

impl Default for WaveAnim {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            speed: 1.0,
            amplitude: 1.0,
            phase: 0.0,
        }
    }
}

/// Pseudo-random intensity modulation built from two detuned sines. The
/// result multiplies intensity and is clamped to [0.1, 2.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlickerAnim {
    /// Modulation speed in radians per second.
    pub speed: f32,
    /// Modulation depth.
    pub intensity: f32,
    /// Per-light phase seed so neighboring lights decorrelate.
    pub seed: f32,
}

impl Default for FlickerAnim {
    fn default() -> Self {
        Self {
            speed: 10.0,
            intensity: 0.3,
            seed: 0.0,
        }
    }
}

/// Sinusoidal modulation of intensity and/or radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseAnim {
    /// Modulation speed in radians per second.
    pub speed: f32,
    /// Modulation depth (0 = identity).
    pub amount: f32,
    /// Which properties the pulse touches.
    pub target: PulseTarget,
}

impl Default for PulseAnim {
    fn default() -> Self {
        Self {
            speed: 1.0,
            amount: 0.5,
            target: PulseTarget::INTENSITY,
        }
    }
}

/// Orientation spin about an axis through the origin. Applies to spot
/// directions and rect normal/tangent/bitangent frames, and rotates the
/// light's current world position along with them (orbit-style motion).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateAnim {
    /// Rotation axis (unit length once attached).
    pub axis: Vec3,
    /// Angular speed in radians per second.
    pub speed: f32,
    /// Continuous spin or sinusoidal swing.
    pub mode: RotateMode,
    /// Maximum deflection in radians (swing mode only).
    pub max_angle: f32,
}

impl Default for RotateAnim {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            speed: 1.0,
            mode: RotateMode::Continuous,
            max_angle: std::f32::consts::FRAC_PI_4,
        }
    }
}

/// Number of `f32` parameters per light in the packed bulk-add layout
/// consumed by [`AnimationDesc::from_packed`].
pub const PACKED_ANIM_STRIDE: usize = 26;

/// Complete animation state for one light: active flags plus parameters for
/// every sub-animation (inactive ones keep their defaults).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationDesc {
    /// Which sub-animations are active.
    pub flags: AnimationFlags,
    /// Circular orbit parameters.
    pub circular: CircularAnim,
    /// Linear interpolation parameters.
    pub linear: LinearAnim,
    /// Wave offset parameters.
    pub wave: WaveAnim,
    /// Flicker modulation parameters.
    pub flicker: FlickerAnim,
    /// Pulse modulation parameters.
    pub pulse: PulseAnim,
    /// Rotation parameters.
    pub rotate: RotateAnim,
}

impl AnimationDesc {
    /// A descriptor with no active sub-animations.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether any sub-animation is active.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Attach a circular orbit.
    #[must_use]
    pub fn with_circular(mut self, circular: CircularAnim) -> Self {
        self.flags |= AnimationFlags::CIRCULAR;
        self.circular = circular;
        self
    }

    /// Attach a linear interpolation.
    #[must_use]
    pub fn with_linear(mut self, linear: LinearAnim) -> Self {
        self.flags |= AnimationFlags::LINEAR;
        self.linear = linear;
        self
    }

    /// Attach a wave offset. The axis is normalized here; a degenerate axis
    /// falls back to +Y.
    #[must_use]
    pub fn with_wave(mut self, mut wave: WaveAnim) -> Self {
        wave.axis = wave.axis.try_normalize().unwrap_or(Vec3::Y);
        self.flags |= AnimationFlags::WAVE;
        self.wave = wave;
        self
    }

    /// Attach a flicker modulation.
    #[must_use]
    pub fn with_flicker(mut self, flicker: FlickerAnim) -> Self {
        self.flags |= AnimationFlags::FLICKER;
        self.flicker = flicker;
        self
    }

    /// Attach a pulse modulation.
    #[must_use]
    pub fn with_pulse(mut self, pulse: PulseAnim) -> Self {
        self.flags |= AnimationFlags::PULSE;
        self.pulse = pulse;
        self
    }

    /// Attach a rotation. The axis is normalized here; a degenerate axis
    /// falls back to +Y.
    #[must_use]
    pub fn with_rotate(mut self, mut rotate: RotateAnim) -> Self {
        rotate.axis = rotate.axis.try_normalize().unwrap_or(Vec3::Y);
        self.flags |= AnimationFlags::ROTATE;
        self.rotate = rotate;
        self
    }

    /// Decode a descriptor from the packed bulk-add layout: a raw flags word
    /// plus [`PACKED_ANIM_STRIDE`] floats. Axes are normalized exactly as in
    /// the builder methods so bulk and serial adds produce identical state.
    #[must_use]
    pub fn from_packed(flags: u32, params: &[f32]) -> Self {
        let flags = AnimationFlags::from_bits_truncate(flags);
        if flags.is_empty() || params.len() < PACKED_ANIM_STRIDE {
            return Self::default();
        }
        let mut desc = Self {
            flags: AnimationFlags::empty(),
            ..Self::default()
        };
        if flags.contains(AnimationFlags::CIRCULAR) {
            desc = desc.with_circular(CircularAnim {
                speed: params[0],
                radius: params[1],
            });
        }
        if flags.contains(AnimationFlags::LINEAR) {
            desc = desc.with_linear(LinearAnim {
                target: Vec3::new(params[2], params[3], params[4]),
                duration: params[5],
                delay: params[6],
                mode: LinearMode::from_code(params[7]),
            });
        }
        if flags.contains(AnimationFlags::WAVE) {
            desc = desc.with_wave(WaveAnim {
                axis: Vec3::new(params[8], params[9], params[10]),
                speed: params[11],
                amplitude: params[12],
                phase: params[13],
            });
        }
        if flags.contains(AnimationFlags::FLICKER) {
            desc = desc.with_flicker(FlickerAnim {
                speed: params[14],
                intensity: params[15],
                seed: params[16],
            });
        }
        if flags.contains(AnimationFlags::PULSE) {
            desc = desc.with_pulse(PulseAnim {
                speed: params[17],
                amount: params[18],
                target: PulseTarget::from_bits_truncate(params[19] as u32),
            });
        }
        if flags.contains(AnimationFlags::ROTATE) {
            desc = desc.with_rotate(RotateAnim {
                axis: Vec3::new(params[20], params[21], params[22]),
                speed: params[23],
                mode: RotateMode::from_code(params[24]),
                max_angle: params[25],
            });
        }
        desc
    }

    /// Encode into the packed bulk-add layout. `out` must hold at least
    /// [`PACKED_ANIM_STRIDE`] floats.
    pub fn to_packed(&self, out: &mut [f32]) {
        out[0] = self.circular.speed;
        out[1] = self.circular.radius;
        out[2] = self.linear.target.x;
        out[3] = self.linear.target.y;
        out[4] = self.linear.target.z;
        out[5] = self.linear.duration;
        out[6] = self.linear.delay;
        out[7] = self.linear.mode.code();
        out[8] = self.wave.axis.x;
        out[9] = self.wave.axis.y;
        out[10] = self.wave.axis.z;
        out[11] = self.wave.speed;
        out[12] = self.wave.amplitude;
        out[13] = self.wave.phase;
        out[14] = self.flicker.speed;
        out[15] = self.flicker.intensity;
        out[16] = self.flicker.seed;
        out[17] = self.pulse.speed;
        out[18] = self.pulse.amount;
        out[19] = self.pulse.target.bits() as f32;
        out[20] = self.rotate.axis.x;
        out[21] = self.rotate.axis.y;
        out[22] = self.rotate.axis.z;
        out[23] = self.rotate.speed;
        out[24] = self.rotate.mode.code();
        out[25] = self.rotate.max_angle;
    }
}
