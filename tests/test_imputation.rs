//! Integration test: transform bank and distance-weighted imputation

use ckd_automl::error::CkdError;
use ckd_automl::imputation::{is_missing, DistanceWeightedImputer, Imputer};
use ckd_automl::prelude::*;
use ndarray::{Array1, Array2};

/// 20 subjects, 3 numeric and 2 categorical attributes, 4 rows with one
/// absent numeric cell each
fn create_dataset() -> PartitionedDataset {
    let mut features = Array2::from_shape_fn((20, 5), |(i, j)| {
        let sick = i % 2 == 0;
        let t = i as f64;
        match j {
            0 => 40.0 + t + if sick { 12.0 } else { 0.0 },
            1 => 1.0 + 0.1 * (t * 0.9).sin() + if sick { 2.5 } else { 0.0 },
            2 => 130.0 + (t * 0.4).cos() * 3.0 - if sick { 8.0 } else { 0.0 },
            3 => if sick { 1.0 } else { 0.0 },
            _ => (i % 3 == 0) as u8 as f64,
        }
    });
    for &(i, j) in MISSING.iter() {
        features[[i, j]] = f64::NAN;
    }
    let target = Array1::from_shape_fn(20, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
    PartitionedDataset::from_parts(
        vec!["age".into(), "creatinine".into(), "sodium".into()],
        vec!["anemia".into(), "edema".into()],
        "class".into(),
        features,
        target,
    )
    .unwrap()
}

const MISSING: [(usize, usize); 4] = [(3, 1), (8, 0), (12, 2), (17, 1)];

/// Rows observing `col`, nearest first, under the rescaled partial distance
fn nearest_donors(x: &Array2<f64>, row: usize, col: usize, k: usize) -> Vec<usize> {
    let mut donors: Vec<(f64, usize)> = (0..x.nrows())
        .filter(|&r| !is_missing(x[[r, col]]))
        .map(|r| {
            let (mut shared, mut sum) = (0usize, 0.0);
            for j in 0..x.ncols() {
                let (a, b) = (x[[row, j]], x[[r, j]]);
                if !is_missing(a) && !is_missing(b) {
                    shared += 1;
                    sum += (a - b) * (a - b);
                }
            }
            ((x.ncols() as f64 / shared as f64 * sum).sqrt(), r)
        })
        .collect();
    donors.sort_by(|a, b| a.partial_cmp(b).unwrap());
    donors.into_iter().take(k).map(|(_, r)| r).collect()
}

#[test]
fn test_estimates_stay_within_nearest_donor_range() {
    let ds = create_dataset();
    let imputed = DistanceWeightedImputer::new(3)
        .with_target_in_distance(false)
        .impute_dataset("identity", &ds)
        .unwrap();

    assert!(imputed.is_complete());
    assert_eq!(imputed.imputed_cells, 4);
    let out = imputed.data.features();
    assert!(out.iter().all(|v| !is_missing(*v)));

    let original = ds.features();
    for &(i, j) in MISSING.iter() {
        let donors = nearest_donors(original, i, j, 3);
        assert_eq!(donors.len(), 3);
        let values: Vec<f64> = donors.iter().map(|&r| original[[r, j]]).collect();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(out[[i, j]] >= lo && out[[i, j]] <= hi, "cell ({}, {})", i, j);
    }

    // a healthy row is filled from healthy donors
    assert!(out[[3, 1]] < 1.5);
    // observed cells and the target are untouched
    assert_eq!(out[[0, 0]], original[[0, 0]]);
    assert_eq!(imputed.data.target(), ds.target());
}

#[test]
fn test_exact_duplicate_donor_takes_all_weight() {
    let mut x = Array2::from_shape_vec(
        (4, 2),
        vec![1.0, 10.0, 1.0, 20.0, 5.0, 50.0, 9.0, 90.0],
    )
    .unwrap();
    x[[1, 1]] = f64::NAN;
    let mut imputer = DistanceWeightedImputer::new(3);
    let out = imputer.fit_transform(&x).unwrap();
    assert_eq!(out[[1, 1]], 10.0);
}

#[test]
fn test_complete_data_is_unchanged() {
    let features = Array2::from_shape_fn((6, 2), |(i, j)| (i * 2 + j) as f64);
    let ds = PartitionedDataset::from_parts(
        vec!["a".into(), "b".into()],
        vec![],
        "y".into(),
        features.clone(),
        Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
    )
    .unwrap();
    let imputed = DistanceWeightedImputer::new(8)
        .impute_dataset("identity", &ds)
        .unwrap();
    assert_eq!(imputed.imputed_cells, 0);
    assert_eq!(imputed.data.features(), &features);
}

#[test]
fn test_target_in_distance_changes_donors() {
    // row 0 is equidistant on features from a sick and a healthy donor
    let features = Array2::from_shape_vec(
        (3, 2),
        vec![0.0, f64::NAN, 1.0, 100.0, -1.0, 0.0],
    )
    .unwrap();
    let target = Array1::from_vec(vec![1.0, 1.0, 0.0]);
    let ds = PartitionedDataset::from_parts(
        vec!["a".into(), "b".into()],
        vec![],
        "y".into(),
        features,
        target,
    )
    .unwrap();

    let with_target = DistanceWeightedImputer::new(1)
        .impute_dataset("identity", &ds)
        .unwrap();
    assert_eq!(with_target.data.features()[[0, 1]], 100.0);

    let without = DistanceWeightedImputer::new(2)
        .with_target_in_distance(false)
        .impute_dataset("identity", &ds)
        .unwrap();
    assert!((without.data.features()[[0, 1]] - 50.0).abs() < 1e-9);
}

#[test]
fn test_unobserved_attribute_is_underflow() {
    let mut ds_features = create_dataset().features().clone();
    ds_features.column_mut(2).fill(f64::NAN);
    let ds = create_dataset().with_features(ds_features).unwrap();

    let imputed = DistanceWeightedImputer::new(3)
        .impute_dataset("identity", &ds)
        .unwrap();
    assert_eq!(imputed.unresolved, vec!["sodium".to_string()]);
    assert!(!imputed.is_complete());
    match imputed.into_complete() {
        Err(CkdError::ImputationUnderflow { attributes }) => {
            assert_eq!(attributes, vec!["sodium".to_string()])
        }
        other => panic!("expected underflow, got {:?}", other.map(|d| d.n_rows())),
    }

    let mut strict = DistanceWeightedImputer::new(3);
    assert!(strict.fit_transform(ds.features()).is_err());
}

#[test]
fn test_every_variant_imputes_independently() {
    let ds = create_dataset();
    let bank = TransformBank::new(TransformBank::default_strategies((25.0, 75.0), (15.0, 85.0)));
    let variants = bank.apply(&ds).unwrap();
    assert_eq!(variants.len(), bank.variant_ids().len());

    let imputer = DistanceWeightedImputer::new(3);
    for variant in &variants {
        // categorical block is never transformed
        assert_eq!(variant.data.categorical(), ds.categorical());
        assert_eq!(variant.data.n_rows(), ds.n_rows());
        let imputed = imputer.impute_variant(variant).unwrap();
        assert_eq!(imputed.variant, variant.id);
        assert_eq!(imputed.imputed_cells, 4);
        assert!(imputed.data.features().iter().all(|v| v.is_finite()));
    }
}
