//! Per-frame animation evaluation.
//!
//! Every call recomputes the transient fields (position, intensity, radius,
//! orientation frames) from the base fields at the given time, so mutating a
//! base value mid-animation can never desync later frames. Lights with no
//! active animation are skipped; their transient fields already mirror the
//! base values.

use glam::{Quat, Vec3};

use super::{AnimationDesc, AnimationFlags, LinearMode, PulseTarget, RotateMode};
use crate::light::{LightCore, LightStore};

use std::f32::consts::TAU;

/// Positional offset from the additive sub-animations
/// (circular → linear → wave). Circular only applies to point lights.
fn position_offset(
    desc: &AnimationDesc,
    base: Vec3,
    t: f32,
    allow_circular: bool,
) -> Vec3 {
    let mut delta = Vec3::ZERO;

    if allow_circular && desc.flags.contains(AnimationFlags::CIRCULAR) {
        let angle = t * desc.circular.speed;
        delta.x += angle.sin() * desc.circular.radius;
        delta.z += angle.cos() * desc.circular.radius;
    }

    if desc.flags.contains(AnimationFlags::LINEAR) && t >= desc.linear.delay {
        let progress = if desc.linear.duration > 0.0 {
            (t - desc.linear.delay) / desc.linear.duration
        } else {
            1.0
        };
        let progress = match desc.linear.mode {
            LinearMode::Once => progress.clamp(0.0, 1.0),
            LinearMode::Loop => progress.fract(),
            LinearMode::PingPong => {
                let cycle = progress.floor();
                let frac = progress - cycle;
                if cycle as i64 % 2 == 1 {
                    1.0 - frac
                } else {
                    frac
                }
            }
        };
        delta += (desc.linear.target - base) * progress;
    }

    if desc.flags.contains(AnimationFlags::WAVE) {
        delta += desc.wave.axis
            * ((t * desc.wave.speed + desc.wave.phase).sin()
                * desc.wave.amplitude);
    }

    delta
}

/// Multiplicative intensity factor (flicker → pulse).
fn intensity_scale(desc: &AnimationDesc, t: f32) -> f32 {
    let mut scale = 1.0;

    if desc.flags.contains(AnimationFlags::FLICKER) {
        let f = &desc.flicker;
        let factor = 1.0
            + (t * f.speed + f.seed).sin()
                * (t * 1.7 * f.speed + 2.3 * f.seed).cos()
                * f.intensity;
        scale *= factor.clamp(0.1, 2.0);
    }

    if desc.flags.contains(AnimationFlags::PULSE)
        && desc.pulse.target.contains(PulseTarget::INTENSITY)
    {
        scale *= 1.0 + (t * desc.pulse.speed).sin() * desc.pulse.amount;
    }

    scale
}

/// Multiplicative radius factor (pulse only).
fn radius_scale(desc: &AnimationDesc, t: f32) -> f32 {
    if desc.flags.contains(AnimationFlags::PULSE)
        && desc.pulse.target.contains(PulseTarget::RADIUS)
    {
        1.0 + (t * desc.pulse.speed).sin() * desc.pulse.amount
    } else {
        1.0
    }
}

/// Active rotation at time `t`, if the descriptor carries one.
fn rotation(desc: &AnimationDesc, t: f32) -> Option<Quat> {
    if !desc.flags.contains(AnimationFlags::ROTATE) {
        return None;
    }
    let r = &desc.rotate;
    let angle = match r.mode {
        RotateMode::Continuous => (t * r.speed / TAU).fract() * TAU,
        RotateMode::Swing => (t * r.speed).sin() * r.max_angle,
    };
    Some(Quat::from_axis_angle(r.axis, angle))
}

/// Recompute one light's shared transient fields.
fn apply_common(
    core: &mut LightCore,
    desc: &AnimationDesc,
    t: f32,
    allow_circular: bool,
) {
    core.position = core.base_position
        + position_offset(desc, core.base_position, t, allow_circular);
    core.intensity = core.base_intensity * intensity_scale(desc, t);
    core.radius = core.base_radius * radius_scale(desc, t);
}

/// Evaluate every animated light in the store at time `t`.
pub fn evaluate_store(store: &mut LightStore, t: f32) {
    for light in store.points_mut() {
        let desc = light.core.animation;
        if !desc.is_animated() {
            continue;
        }
        apply_common(&mut light.core, &desc, t, true);
    }

    for light in store.spots_mut() {
        let desc = light.core.animation;
        if !desc.is_animated() {
            continue;
        }
        apply_common(&mut light.core, &desc, t, false);
        if let Some(q) = rotation(&desc, t) {
            light.direction = q * light.base_direction;
            // The rotation also orbits the light about its axis through the
            // origin; scenes rely on the coupled motion.
            light.core.position = q * light.core.position;
        } else {
            light.direction = light.base_direction;
        }
    }

    for light in store.rects_mut() {
        let desc = light.core.animation;
        if !desc.is_animated() {
            continue;
        }
        apply_common(&mut light.core, &desc, t, false);
        if let Some(q) = rotation(&desc, t) {
            light.normal = q * light.base_normal;
            light.tangent = q * light.base_tangent;
            light.bitangent = q * light.base_bitangent;
            light.core.position = q * light.core.position;
        } else {
            light.normal = light.base_normal;
            light.tangent = light.base_tangent;
            light.bitangent = light.base_bitangent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{
        CircularAnim, FlickerAnim, LinearAnim, PulseAnim, RotateAnim, WaveAnim,
    };
    use crate::light::{LightStore, PointLightDesc, SpotLightDesc};
    use crate::options::EngineOptions;

    use std::f32::consts::PI;

    fn store() -> LightStore {
        LightStore::new(&EngineOptions {
            max_lights: 16,
            ..EngineOptions::default()
        })
        .unwrap()
    }

    fn eval_point_position(desc: AnimationDesc, base: Vec3, t: f32) -> Vec3 {
        let mut s = store();
        let id = s
            .add_point(&PointLightDesc {
                position: base,
                animation: desc,
                ..PointLightDesc::default()
            })
            .unwrap();
        evaluate_store(&mut s, t);
        s.light_core(id).unwrap().position
    }

    #[test]
    fn test_circular_orbit() {
        let desc = AnimationDesc::none().with_circular(CircularAnim {
            speed: PI,
            radius: 1.0,
        });
        // Quarter turn: offset (sin(pi/2), 0, cos(pi/2)) = (1, 0, 0)
        let pos = eval_point_position(desc, Vec3::ZERO, 0.5);
        assert!((pos - Vec3::X).length() < 1e-5, "got {pos:?}");
        // t = 0: offset (0, 0, radius)
        let pos = eval_point_position(desc, Vec3::ZERO, 0.0);
        assert!((pos - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_linear_ping_pong() {
        let desc = AnimationDesc::none().with_linear(LinearAnim {
            target: Vec3::new(10.0, 0.0, 0.0),
            duration: 1.0,
            delay: 0.0,
            mode: LinearMode::PingPong,
        });
        for (t, expected_x) in
            [(0.5, 5.0), (1.0, 10.0), (1.5, 5.0), (2.0, 0.0)]
        {
            let pos = eval_point_position(desc, Vec3::ZERO, t);
            assert!(
                (pos.x - expected_x).abs() < 1e-4,
                "t={t}: expected x={expected_x}, got {}",
                pos.x
            );
        }
    }

    #[test]
    fn test_linear_loop_wraps() {
        let desc = AnimationDesc::none().with_linear(LinearAnim {
            target: Vec3::new(10.0, 0.0, 0.0),
            duration: 1.0,
            delay: 0.0,
            mode: LinearMode::Loop,
        });
        let eps = 0.125;
        let wrapped = eval_point_position(desc, Vec3::ZERO, 1.0 + eps);
        let early = eval_point_position(desc, Vec3::ZERO, eps);
        assert!((wrapped - early).length() < 1e-4);
    }

    #[test]
    fn test_linear_waits_for_delay() {
        let desc = AnimationDesc::none().with_linear(LinearAnim {
            target: Vec3::new(10.0, 0.0, 0.0),
            duration: 1.0,
            delay: 2.0,
            mode: LinearMode::Once,
        });
        let before = eval_point_position(desc, Vec3::ZERO, 1.9);
        assert_eq!(before, Vec3::ZERO);
        let after = eval_point_position(desc, Vec3::ZERO, 2.5);
        assert!((after.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_wave_oscillates_along_axis() {
        let desc = AnimationDesc::none().with_wave(WaveAnim {
            axis: Vec3::Y,
            speed: PI,
            amplitude: 2.0,
            phase: 0.0,
        });
        let pos = eval_point_position(desc, Vec3::ZERO, 0.5);
        assert!((pos.y - 2.0).abs() < 1e-5);
        assert!(pos.x.abs() < 1e-6 && pos.z.abs() < 1e-6);
    }

    #[test]
    fn test_offsets_compose_additively() {
        let desc = AnimationDesc::none()
            .with_circular(CircularAnim {
                speed: PI,
                radius: 1.0,
            })
            .with_wave(WaveAnim {
                axis: Vec3::Y,
                speed: PI,
                amplitude: 2.0,
                phase: 0.0,
            });
        let pos = eval_point_position(desc, Vec3::ZERO, 0.5);
        assert!((pos - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_pulse_scales_intensity() {
        let mut s = store();
        let id = s
            .add_point(&PointLightDesc {
                intensity: 10.0,
                animation: AnimationDesc::none().with_pulse(PulseAnim {
                    speed: 2.0 * PI,
                    amount: 0.5,
                    target: PulseTarget::INTENSITY,
                }),
                ..PointLightDesc::default()
            })
            .unwrap();
        evaluate_store(&mut s, 0.25);
        let core = s.light_core(id).unwrap();
        assert!((core.intensity - 15.0).abs() < 1e-4);
        // Radius untouched when pulse targets intensity only
        assert_eq!(core.radius, core.base_radius);
    }

    #[test]
    fn test_pulse_identity_at_zero_amount() {
        let mut s = store();
        let id = s
            .add_point(&PointLightDesc {
                intensity: 7.5,
                animation: AnimationDesc::none().with_pulse(PulseAnim {
                    speed: 3.0,
                    amount: 0.0,
                    target: PulseTarget::INTENSITY | PulseTarget::RADIUS,
                }),
                ..PointLightDesc::default()
            })
            .unwrap();
        for t in [0.0, 0.3, 1.7, 42.0] {
            evaluate_store(&mut s, t);
            let core = s.light_core(id).unwrap();
            assert_eq!(core.intensity, 7.5);
            assert_eq!(core.radius, core.base_radius);
        }
    }

    #[test]
    fn test_flicker_stays_clamped() {
        let mut s = store();
        let id = s
            .add_point(&PointLightDesc {
                intensity: 1.0,
                animation: AnimationDesc::none().with_flicker(FlickerAnim {
                    speed: 13.0,
                    intensity: 5.0, // over-driven on purpose
                    seed: 1.0,
                }),
                ..PointLightDesc::default()
            })
            .unwrap();
        for i in 0..100 {
            evaluate_store(&mut s, i as f32 * 0.173);
            let intensity = s.light_core(id).unwrap().intensity;
            assert!((0.1..=2.0).contains(&intensity), "got {intensity}");
        }
    }

    #[test]
    fn test_rotate_spins_direction_and_position() {
        let mut s = store();
        let id = s
            .add_spot(&SpotLightDesc {
                position: Vec3::new(2.0, 0.0, 0.0),
                direction: Vec3::X,
                animation: AnimationDesc::none().with_rotate(RotateAnim {
                    axis: Vec3::Y,
                    speed: PI,
                    mode: RotateMode::Continuous,
                    max_angle: 0.0,
                }),
                ..SpotLightDesc::default()
            })
            .unwrap();
        // Half turn about +Y: +X maps to -X, and the position orbits too
        evaluate_store(&mut s, 1.0);
        let spot = s.spot(id).unwrap();
        assert!((spot.direction - Vec3::NEG_X).length() < 1e-5);
        assert!(
            (spot.core.position - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5
        );
        // Base fields are untouched
        assert_eq!(spot.base_direction, Vec3::X);
        assert_eq!(spot.core.base_position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_evaluation_is_idempotent_per_time() {
        let desc = AnimationDesc::none()
            .with_circular(CircularAnim {
                speed: 2.0,
                radius: 3.0,
            })
            .with_pulse(PulseAnim::default());
        let mut s = store();
        let id = s
            .add_point(&PointLightDesc {
                position: Vec3::new(5.0, 1.0, 5.0),
                animation: desc,
                ..PointLightDesc::default()
            })
            .unwrap();
        evaluate_store(&mut s, 0.7);
        let first = s.light_core(id).unwrap().position;
        // Evaluating other times and returning must land on the same state
        evaluate_store(&mut s, 3.1);
        evaluate_store(&mut s, 0.7);
        assert_eq!(s.light_core(id).unwrap().position, first);
    }
}
