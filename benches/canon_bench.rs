// Benchmark for feed chaining, arc handling and NURBS fitting
// Run with: cargo bench

use canon_rs::canon::{ArcCommand, ControlPoint};
use canon_rs::{Canon, CanonSettings};
use canon_shared::Pose;
use criterion::{criterion_group, criterion_main, Criterion};

fn create_session(tolerance: f64) -> Canon {
    let settings = CanonSettings {
        naivecam_tolerance: tolerance,
        ..CanonSettings::default()
    };
    let mut canon = Canon::new(settings);
    canon.init_canon();
    canon.set_feed_rate(1500.0);
    canon
}

fn bench_straight_feeds(c: &mut Criterion) {
    c.bench_function("10k collinear feeds", |b| {
        b.iter(|| {
            let mut canon = create_session(0.01);
            for i in 1..=10_000 {
                canon.straight_feed(i, &Pose::xyz(i as f64 * 0.1, 0.0, 0.0));
            }
            canon.finish();
            // One move per full chain.
            assert!(canon.drain().len() >= 10_000 / 101);
        });
    });

    c.bench_function("10k zigzag feeds", |b| {
        b.iter(|| {
            let mut canon = create_session(0.0);
            for i in 1..=10_000 {
                let y = if i % 2 == 0 { 1.0 } else { 0.0 };
                canon.straight_feed(i, &Pose::xyz(i as f64, y, 0.0));
            }
            canon.finish();
            canon.drain().len()
        });
    });
}

fn bench_arc_feeds(c: &mut Criterion) {
    c.bench_function("1k small arcs", |b| {
        b.iter(|| {
            let mut canon = create_session(0.005);
            for i in 0..1000 {
                let x = (i + 1) as f64;
                let arc = ArcCommand {
                    first_end: x,
                    second_end: 0.0,
                    first_axis: x - 0.5,
                    second_axis: -20.0,
                    rotation: -1,
                    ..ArcCommand::default()
                };
                canon.arc_feed(i, &arc);
            }
            canon.finish();
            canon.drain().len()
        });
    });
}

fn bench_nurbs(c: &mut Criterion) {
    let points: Vec<ControlPoint> = (0..32)
        .map(|i| ControlPoint {
            x: i as f64 * 5.0,
            y: if i % 2 == 0 { 0.0 } else { 10.0 },
            weight: 1.0,
        })
        .collect();
    c.bench_function("32 point cubic NURBS", |b| {
        b.iter(|| {
            let mut canon = create_session(0.0);
            canon.nurbs_feed(1, &points, 4);
            canon.drain().len()
        });
    });
}

criterion_group!(benches, bench_straight_feeds, bench_arc_feeds, bench_nurbs);
criterion_main!(benches);
