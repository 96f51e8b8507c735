use ckd_automl::data::PartitionedDataset;
use ckd_automl::decomposition::Pca;
use ckd_automl::imputation::DistanceWeightedImputer;
use ckd_automl::preprocessing::TransformBank;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_dataset(n_rows: usize, missing_rate: f64) -> PartitionedDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_numeric = 14;
    let n_categorical = 10;

    let features = Array2::from_shape_fn((n_rows, n_numeric + n_categorical), |(_, j)| {
        if rng.gen::<f64>() < missing_rate {
            f64::NAN
        } else if j < n_numeric {
            rng.gen::<f64>() * 100.0
        } else {
            (rng.gen::<f64>() < 0.5) as u8 as f64
        }
    });
    let target = Array1::from_shape_fn(n_rows, |i| (i % 2) as f64);

    PartitionedDataset::from_parts(
        (0..n_numeric).map(|i| format!("numeric_{}", i)).collect(),
        (0..n_categorical).map(|i| format!("categorical_{}", i)).collect(),
        "target".to_string(),
        features,
        target,
    )
    .unwrap()
}

fn bench_imputation(c: &mut Criterion) {
    let mut group = c.benchmark_group("imputation");
    group.sample_size(10);

    for n_rows in [100, 400, 1600].iter() {
        let ds = create_dataset(*n_rows, 0.1);

        group.bench_with_input(BenchmarkId::new("knn_k8", n_rows), &ds, |b, ds| {
            let imputer = DistanceWeightedImputer::new(8);
            b.iter(|| imputer.impute_dataset("identity", black_box(ds)).unwrap())
        });
    }

    group.finish();
}

fn bench_transform_bank(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_bank");
    let bank = TransformBank::default();

    for n_rows in [400, 1600].iter() {
        let ds = create_dataset(*n_rows, 0.1);

        group.bench_with_input(BenchmarkId::new("apply", n_rows), &ds, |b, ds| {
            b.iter(|| bank.apply(black_box(ds)).unwrap())
        });
    }

    group.finish();
}

fn bench_pca(c: &mut Criterion) {
    let mut group = c.benchmark_group("pca");

    for n_rows in [400, 1600].iter() {
        let x = create_dataset(*n_rows, 0.0).features().clone();

        group.bench_with_input(BenchmarkId::new("full_fit", n_rows), &x, |b, x| {
            b.iter(|| Pca::full().fit(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_imputation, bench_transform_bank, bench_pca);
criterion_main!(benches);
