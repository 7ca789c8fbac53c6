use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use bvh_broadphase::{
    Body, BodyId, BroadPhase, BroadPhaseSettings, BuildInput, BuildMode, Collider, MotionVelocity, RigidPose,
    Sphere, StepInput, ThreadDispatcher,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::Vec3;

fn grid_of_spheres(count: usize) -> (Vec<Body>, Vec<MotionVelocity>) {
    let side = (count as f32).cbrt().ceil() as usize;
    let sphere = Arc::new(Collider::from(Sphere::new(0.5)));
    let bodies = (0..count)
        .map(|i| {
            let cell = Vec3::new((i % side) as f32, ((i / side) % side) as f32, (i / (side * side)) as f32);
            Body::new(BodyId(i as u32), RigidPose::from_position(cell * 1.5), Some(sphere.clone()))
        })
        .collect();
    let velocities = (0..count)
        .map(|i| MotionVelocity::new(Vec3::new(0.0, (i % 3) as f32, 1.0), Vec3::new(0.0, 0.5, 0.0)))
        .collect();
    (bodies, velocities)
}

fn bench_dynamic_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_tree_build");
    group.sample_size(30);
    group.measurement_time(Duration::from_secs(5));
    let dispatcher = ThreadDispatcher::with_available_parallelism();
    let settings = BroadPhaseSettings::default().with_thread_count_hint(dispatcher.thread_count());
    for &n in &[1_000usize, 10_000, 100_000] {
        let (bodies, velocities) = grid_of_spheres(n);
        let mut broad_phase = BroadPhase::new(0, n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                broad_phase.build(
                    BuildInput {
                        static_bodies: &[],
                        dynamic_bodies: &bodies,
                        motion_velocities: &velocities,
                        step: StepInput::default(),
                        build_static_tree: BuildMode::Skip,
                    },
                    &settings,
                    &dispatcher,
                );
                black_box(broad_phase.dynamic_tree().node_count());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dynamic_build);
criterion_main!(benches);
