//! Integration test: component sweep, boosting stage and the accuracy table

use ckd_automl::evaluation::BOOSTED_PREFIX;
use ckd_automl::prelude::*;
use ndarray::{Array1, Array2};

/// Two well separated classes; the class signal lies along the
/// highest-variance direction so the first component carries it
fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 6), |(i, j)| {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let t = i as f64;
        match j {
            0 => sign * 5.0 + (t * 0.37).sin(),
            1 => sign * 4.0 + (t * 0.53).cos(),
            2 => (t * 1.3).sin() * 0.5,
            3 => (t * 0.7).cos() * 0.5,
            4 => ((t * 2.1).sin() + (t * 0.2).cos()) * 0.3,
            _ => (t * 0.11).sin() * 0.2,
        }
    });
    let y = Array1::from_shape_fn(n, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
    (x, y)
}

fn roster() -> Vec<RosterEntry> {
    default_roster()
        .into_iter()
        .filter(|e| {
            matches!(
                e.id.as_str(),
                "svm-linear" | "logistic-regression" | "knn-8" | "decision-tree"
            )
        })
        .collect()
}

fn split() -> ckd_automl::training::TrainTestSplit {
    let (x, y) = separable(100);
    train_test_split(&x, &y, 0.2, 12).unwrap()
}

#[test]
fn test_linear_families_separate_from_two_components() {
    let outcome = DimensionalitySweep::new(roster())
        .with_bounds(2, None)
        .run("identity", &split())
        .unwrap();

    assert!(outcome.failures.is_empty());
    // 4 families x 5 counts x 2 splits
    assert_eq!(outcome.table.len(), 40);

    for family in ["svm-linear", "logistic-regression"] {
        let curve = outcome.table.curve("identity", family, SplitKind::Test);
        assert_eq!(curve.iter().map(|(c, _)| *c).collect::<Vec<_>>(), vec![2, 3, 4, 5, 6]);
        for (c, acc) in curve {
            assert!(acc >= 0.95, "{} at {} components: {}", family, c, acc);
        }
    }
}

#[test]
fn test_sweep_is_deterministic() {
    let split = split();
    let sweep = DimensionalitySweep::new(roster()).with_bounds(1, Some(3));
    let a = sweep.run("standard", &split).unwrap();
    let b = sweep.run("standard", &split).unwrap();
    assert_eq!(a.table.records(), b.table.records());
}

#[test]
fn test_sweep_rejects_bound_above_feature_count() {
    let err = DimensionalitySweep::new(roster())
        .with_bounds(1, Some(7))
        .run("identity", &split());
    assert!(err.is_err());
}

#[test]
fn test_boosting_scores_held_out_only() {
    let split = split();
    let roster = roster();
    let outcome = EnsembleBooster::new(10, 1.0)
        .with_families(Some(vec!["decision-tree".to_string(), "logistic-regression".to_string()]))
        .run("identity", &roster, &split)
        .unwrap();

    assert_eq!(outcome.table.len(), 2);
    for (key, acc) in outcome.table.iter() {
        assert!(key.classifier.starts_with(BOOSTED_PREFIX));
        assert_eq!(key.reduction, Reduction::Unreduced);
        assert_eq!(key.split, SplitKind::Test);
        assert!(acc >= 0.9);
    }
}

#[test]
fn test_combined_outcome_keeps_one_table() {
    let split = split();
    let mut outcome = DimensionalitySweep::new(roster())
        .with_bounds(1, Some(2))
        .run("identity", &split)
        .unwrap();
    let boosted = EnsembleBooster::default()
        .with_families(Some(vec!["decision-tree".to_string()]))
        .run("identity", &roster(), &split)
        .unwrap();
    outcome.merge(boosted).unwrap();

    assert_eq!(outcome.table.len(), 4 * 2 * 2 + 1);
    let (best_key, best) = outcome.table.best(SplitKind::Test).unwrap();
    assert!(best >= 0.95);
    assert_eq!(best_key.split, SplitKind::Test);

    // merging the same records again violates write-once
    let again = DimensionalitySweep::new(roster())
        .with_bounds(1, Some(2))
        .run("identity", &split)
        .unwrap();
    assert!(outcome.merge(again).is_err());

    let json = serde_json::to_value(&outcome.table).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 17);
}
