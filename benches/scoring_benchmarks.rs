//! Scoring benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trackscore_rs::align::align_frames;
use trackscore_rs::curves::{compute_roc_curve, generate_roc_thresholds};
use trackscore_rs::synthetic::TrackSynthesizer;
use trackscore_rs::{AssociationMatrix, BoundingBox, MatchingParams, Track, TrackSet};

/// `n` ground-truth tracks spread across the image, and `n` noisy computed copies.
fn create_scene(n: u32, frames: u32) -> (Vec<Track>, Vec<Track>) {
    let synth = TrackSynthesizer::default();
    let truth = (0..n)
        .map(|i| {
            let x = f64::from(i % 20) * 60.0;
            let y = f64::from(i / 20) * 60.0;
            let start = BoundingBox::from_xywh(x, y, 40.0, 40.0);
            synth.ground_truth_boxes(i, 0..frames, start, (0.5, 0.2))
        })
        .collect();
    let computed = (0..n)
        .map(|i| {
            let x = f64::from(i % 20) * 60.0 + 3.0;
            let y = f64::from(i / 20) * 60.0 + 2.0;
            synth.computed_boxes(
                1_000 + i,
                f64::from(i) / f64::from(n),
                (i % 7)..frames,
                BoundingBox::from_xywh(x, y, 40.0, 40.0),
                (0.5, 0.2),
            )
        })
        .collect();
    (truth, computed)
}

fn benchmark_compute_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_all");
    for &n in &[10u32, 50, 200] {
        let (truth, computed) = create_scene(n, 90);
        let params = MatchingParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut matrix = AssociationMatrix::new();
                matrix
                    .compute_all(
                        black_box(TrackSet::all(&truth)),
                        black_box(TrackSet::all(&computed)),
                        &params,
                    )
                    .expect("scoring succeeds");
                matrix
            })
        });
    }
    group.finish();
}

fn benchmark_align_frames(c: &mut Criterion) {
    let synth = TrackSynthesizer::default();
    let bbox = BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0);
    let a = synth.ground_truth_boxes(1, 0..10_000, bbox, (0.0, 0.0)).sorted_timeline();
    let b = synth
        .with_start(12_000)
        .computed_boxes(2, 0.5, 0..10_000, bbox, (0.0, 0.0))
        .sorted_timeline();

    c.bench_function("align_frames_10k", |bench| {
        bench.iter(|| align_frames(black_box(&a), black_box(&b), 20_000))
    });
}

fn benchmark_roc(c: &mut Criterion) {
    let (truth, computed) = create_scene(200, 30);
    let params = MatchingParams::default();
    let mut matrix = AssociationMatrix::new();
    matrix
        .compute_all(TrackSet::all(&truth), TrackSet::all(&computed), &params)
        .expect("scoring succeeds");

    c.bench_function("generate_roc_thresholds_200", |b| {
        b.iter(|| generate_roc_thresholds(black_box(computed.iter().map(|t| t.relevancy)), 100))
    });
    c.bench_function("compute_roc_curve_200", |b| {
        b.iter(|| {
            compute_roc_curve(
                black_box(&matrix),
                TrackSet::all(&truth),
                TrackSet::all(&computed),
                &params,
            )
        })
    });
}

criterion_group!(benches, benchmark_compute_all, benchmark_align_frames, benchmark_roc);
criterion_main!(benches);
