//! Integration test: raw CKD file through transform, impute and evaluate

use ckd_automl::prelude::*;
use std::io::Write;

/// Synthetic raw subject, sick on even rows, with scattered unknown cells
fn raw_row(i: usize) -> Vec<String> {
    let sick = i % 2 == 0;
    let t = i as f64;
    let pick = |yes: &str, no: &str| if sick { yes.to_string() } else { no.to_string() };
    let num = |base: f64, delta: f64, wobble: f64| {
        format!("{:.2}", base + if sick { delta } else { 0.0 } + (t * wobble).sin() * delta.abs() * 0.2)
    };
    let mut row = vec![
        num(45.0, 15.0, 0.7),
        num(72.0, 8.0, 1.1),
        pick("1.010", "1.020"),
        pick("2", "0"),
        pick("1", "0"),
        pick("abnormal", "normal"),
        pick("abnormal", "normal"),
        pick("present", "notpresent"),
        if i % 7 == 0 { "present".to_string() } else { "notpresent".to_string() },
        num(110.0, 80.0, 0.3),
        num(32.0, 55.0, 0.9),
        num(0.9, 3.0, 0.5),
        num(140.0, -8.0, 1.7),
        num(4.3, 0.9, 0.2),
        num(15.0, -5.0, 0.6),
        num(45.0, -15.0, 1.3),
        num(7200.0, 2500.0, 0.8),
        num(5.2, -1.8, 0.4),
        pick("yes", "no"),
        pick("yes", "no"),
        if i % 5 == 0 { "yes".to_string() } else { "no".to_string() },
        pick("poor", "good"),
        pick("yes", "no"),
        pick("yes", "no"),
        pick("ckd", "notckd"),
    ];
    // unknown cells in a few numeric and categorical attributes
    if i % 6 == 1 {
        row[15] = "?".to_string();
    }
    if i % 9 == 4 {
        row[5] = "?".to_string();
        row[16] = "?".to_string();
    }
    if i % 11 == 3 {
        row[12] = "?".to_string();
    }
    row
}

fn write_table(n: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..n {
        writeln!(file, "{}", raw_row(i).join(",")).unwrap();
    }
    file.flush().unwrap();
    file
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::new()
        .with_n_neighbors(5)
        .with_component_bounds(1, Some(4))
        .with_variants(vec!["identity".to_string(), "power".to_string()])
        .with_roster(vec![
            RosterEntry::new("gaussian-nb", ClassifierSpec::GaussianNb),
            RosterEntry::new(
                "logistic-regression",
                ClassifierSpec::LogisticRegression { c: 1.0 },
            ),
        ]);
    config.boosting.n_estimators = 10;
    config.boosting.families = Some(vec!["gaussian-nb".to_string()]);
    config
}

#[test]
fn test_full_pipeline_on_raw_file() {
    let file = write_table(80);
    let pipeline = Pipeline::new(config()).unwrap();
    let report = pipeline.run(file.path()).unwrap();

    assert_eq!(report.n_rows, 80);
    assert_eq!(report.n_features, 24);
    assert!(report.missing.iter().any(|m| m.missing > 0));

    // identity plus six strategies, each imputed
    assert_eq!(report.variants.len(), 7);
    for variant in &report.variants {
        assert!(variant.error.is_none(), "{}: {:?}", variant.variant, variant.error);
        assert!(variant.unresolved.is_empty());
        assert!(variant.imputed_cells > 0);
    }
    let evaluated: Vec<&str> = report
        .variants
        .iter()
        .filter(|v| v.evaluated)
        .map(|v| v.variant.as_str())
        .collect();
    assert_eq!(evaluated, vec!["identity", "power"]);

    // per variant: 2 families x 4 counts x 2 splits, plus one boosted score
    assert_eq!(report.table.len(), 2 * (16 + 1));
    assert!(report.failures.is_empty());

    let (best_key, best) = report.best_held_out().unwrap();
    assert!(best >= 0.9, "best {:?} at {}", best_key, best);
}

#[test]
fn test_report_written_as_json() {
    let file = write_table(40);
    let config = config().with_boosting(false).with_variants(vec!["identity".to_string()]);
    let report = Pipeline::new(config).unwrap().run(file.path()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.json");
    report.write_json(&out).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["n_rows"], 40);
    assert_eq!(json["table"].as_array().unwrap().len(), 16);
    assert_eq!(json["missing"].as_array().unwrap().len(), 24);
}

#[test]
fn test_transform_and_impute_leaves_source_untouched() {
    let file = write_table(30);
    let pipeline = Pipeline::new(config()).unwrap();
    let data = pipeline.load(file.path()).unwrap();
    let missing_before = data.total_missing();

    let variants = pipeline.transform_and_impute(&data).unwrap();
    assert_eq!(data.total_missing(), missing_before);
    assert!(missing_before > 0);
    for (variant, imputed) in variants {
        let imputed = imputed.unwrap();
        assert_eq!(imputed.variant, variant.id);
        assert_eq!(imputed.imputed_cells, missing_before);
        assert_eq!(imputed.data.target(), data.target());
    }
}

#[test]
fn test_malformed_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "1,2,3").unwrap();
    writeln!(file, "4,5,6").unwrap();
    file.flush().unwrap();
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    assert!(pipeline.run(file.path()).is_err());
}
