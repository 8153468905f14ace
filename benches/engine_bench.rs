use candela::animation::{
    AnimationDesc, CircularAnim, FlickerAnim, PulseAnim, WaveAnim,
};
use candela::light::morton::{morton2d, spread16};
use candela::light::{LightStore, PointLightDesc};
use candela::options::EngineOptions;
use candela::view::{apply_view_transform, CameraState};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;

fn animated_store(count: u32) -> LightStore {
    let options = EngineOptions {
        max_lights: count,
        ..EngineOptions::default()
    };
    let mut store = LightStore::new(&options).unwrap();
    for i in 0..count {
        let animation = AnimationDesc::none()
            .with_circular(CircularAnim {
                speed: 1.0 + (i % 7) as f32 * 0.3,
                radius: 2.0,
            })
            .with_wave(WaveAnim {
                axis: Vec3::Y,
                speed: 2.0,
                amplitude: 0.5,
                phase: i as f32,
            })
            .with_flicker(FlickerAnim {
                speed: 9.0,
                intensity: 0.4,
                seed: i as f32,
            })
            .with_pulse(PulseAnim::default());
        let _ = store
            .add_point(&PointLightDesc {
                position: Vec3::new(
                    (i * 797 % 4096) as f32,
                    1.0,
                    (i * 397 % 4096) as f32,
                ),
                animation,
                ..PointLightDesc::default()
            })
            .unwrap();
    }
    store
}

fn morton_benchmark(c: &mut Criterion) {
    c.bench_function("spread16", |b| {
        b.iter(|| black_box(spread16(black_box(0xbeef))));
    });
    c.bench_function("morton2d", |b| {
        b.iter(|| black_box(morton2d(black_box(1234), black_box(4321))));
    });
}

fn sort_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("morton_sort");
    for count in [1_000u32, 10_000, 32_000] {
        let _ = group.bench_function(format!("sort_{count}"), |b| {
            b.iter_batched(
                || {
                    let mut store = animated_store(count);
                    // Force a fresh sort on every iteration
                    let first = store.points()[0].core.id;
                    store.set_position(first, Vec3::new(9.0, 0.0, 9.0));
                    store
                },
                |mut store| store.sort(),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_frame");
    let camera = CameraState::identity([1920, 1080], 0.1, 1000.0);
    for count in [1_000u32, 10_000] {
        let mut store = animated_store(count);
        store.sort();
        let _ = group.bench_function(format!("animate_transform_{count}"), |b| {
            let mut t = 0.0f32;
            b.iter(|| {
                t += 0.016;
                candela::animation::evaluate_store(&mut store, t);
                apply_view_transform(&mut store, &camera, 1.0);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, morton_benchmark, sort_benchmark, frame_benchmark);
criterion_main!(benches);
