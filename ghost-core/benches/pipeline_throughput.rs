use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ghost_core::units::Meters;
use ghost_core::{CoachConfig, CoachSession, GhostLap, Lap, TelemetrySample, TrackGeometry};
use std::sync::Arc;

fn lap(index: usize, pace: f64) -> Lap {
    let samples = (0..=3700)
        .map(|i| {
            let d = i as f64;
            let mut sample = TelemetrySample::at(d / 50.0 * pace, d, 50.0 / pace);
            if i % 500 > 420 {
                sample = sample.with_inputs(0.0, 0.8);
            }
            sample
        })
        .collect();
    Lap::new(index, samples, true)
}

fn bench_session(c: &mut Criterion) {
    let track = Arc::new(TrackGeometry::even("Bench", Meters(3700.0), 4).unwrap());
    let ghost = GhostLap::from_lap(&lap(0, 1.0)).unwrap();
    let live = lap(1, 1.02);
    let config = CoachConfig::default();

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Elements(live.samples.len() as u64));
    group.bench_function("process_lap", |b| {
        b.iter(|| {
            let mut session =
                CoachSession::new("bench", track.clone(), ghost.clone(), &config).unwrap();
            for sample in &live.samples {
                black_box(session.process(black_box(sample)).unwrap());
            }
            black_box(session.end_lap())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_session);
criterion_main!(benches);
