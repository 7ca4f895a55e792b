use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use hoopcast::config::{PipelineConfig, SEASON_CURRENT, SEASON_PREVIOUS};
use hoopcast::fake_source::FakeSource;
use hoopcast::features::engineer;
use hoopcast::gamelog::GameLogRow;
use hoopcast::stats_api::StatsProvider;
use hoopcast::train::{train, train_test_split};

fn sample_rows() -> Vec<GameLogRow> {
    let source = FakeSource::seeded(17);
    let id = source.player_id("Jayson Tatum").expect("seeded player");
    let mut rows = source.season_log(id, SEASON_CURRENT).expect("seeded log");
    rows.extend(source.season_log(id, SEASON_PREVIOUS).expect("seeded log"));
    rows
}

fn bench_engineer(c: &mut Criterion) {
    let rows = sample_rows();
    c.bench_function("engineer_two_seasons", |b| {
        b.iter(|| engineer(black_box(&rows), black_box(&[3, 5, 10])).unwrap())
    });
}

fn bench_split(c: &mut Criterion) {
    c.bench_function("train_test_split_75", |b| {
        b.iter(|| train_test_split(black_box(75), black_box(0.2), black_box(42)))
    });
}

fn bench_train(c: &mut Criterion) {
    let rows = sample_rows();
    let table = engineer(&rows, &[3, 5, 10]).unwrap();
    let (x, _) = table.model_matrix();
    let y = table.target();
    let cfg = PipelineConfig::default();
    c.bench_function("train_all_candidates", |b| {
        b.iter(|| train(black_box(x.view()), black_box(&y), black_box(&cfg)).unwrap())
    });
}

criterion_group!(benches, bench_engineer, bench_split, bench_train);
criterion_main!(benches);
