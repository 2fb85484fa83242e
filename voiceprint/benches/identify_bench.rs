use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voxid_voiceprint::{best_match, l2_normalize};

/// Deterministic pseudo-random unit vector.
fn make_embedding(dim: usize, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut v: Vec<f32> = (0..dim)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) - 1.0
        })
        .collect();
    l2_normalize(&mut v);
    v
}

fn bench_best_match_1000(c: &mut Criterion) {
    let dim = 192;
    let population: Vec<(String, Vec<f32>)> = (0..1000)
        .map(|i| (format!("speaker-{i}"), make_embedding(dim, i as u64 + 1)))
        .collect();
    let query = make_embedding(dim, 350);

    // A full scan over 1000 profiles must stay well under 1 ms on a
    // modern core.
    c.bench_function("identify_scan_1000x192", |b| {
        b.iter(|| {
            let m = best_match(
                black_box(&query),
                population.iter().map(|(id, e)| (id.as_str(), e.as_slice())),
            );
            black_box(m)
        });
    });
}

fn bench_best_match_1000_d256(c: &mut Criterion) {
    let dim = 256;
    let population: Vec<(String, Vec<f32>)> = (0..1000)
        .map(|i| (format!("speaker-{i}"), make_embedding(dim, i as u64 + 1)))
        .collect();
    let query = make_embedding(dim, 350);

    c.bench_function("identify_scan_1000x256", |b| {
        b.iter(|| {
            let m = best_match(
                black_box(&query),
                population.iter().map(|(id, e)| (id.as_str(), e.as_slice())),
            );
            black_box(m)
        });
    });
}

criterion_group!(benches, bench_best_match_1000, bench_best_match_1000_d256);
criterion_main!(benches);
