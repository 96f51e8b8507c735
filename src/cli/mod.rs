//! Command-line interface for the CKD pipeline
//!
//! `run` executes the whole pipeline, `inspect` loads and summarizes the raw
//! table, `impute` stops after the transform bank and imputation.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::evaluation::{SplitKind, BOOSTED_PREFIX};
use crate::pipeline::{Pipeline, PipelineReport};
use crate::training::neural_roster;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ckd-automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transform, impute and evaluate classifiers on the chronic kidney disease table")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and print the accuracy summary
    Run {
        /// Raw header-less CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Neighbours used by the imputer
        #[arg(short = 'k', long)]
        neighbors: Option<usize>,

        /// Seed of the train / held-out split
        #[arg(long)]
        seed: Option<u64>,

        /// Held-out share of the rows
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Transform variants to evaluate (comma separated)
        #[arg(long, value_delimiter = ',')]
        variants: Vec<String>,

        /// Skip the boosting stage
        #[arg(long)]
        no_boost: bool,

        /// Add the two perceptron families to the roster
        #[arg(long)]
        neural: bool,
    },

    /// Load the raw table and show its missing-value summary
    Inspect {
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Build the transform variants and impute them, without evaluation
    Impute {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short = 'k', long)]
        neighbors: Option<usize>,
    },
}

/// Overrides taken from the `run` command line
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub neighbors: Option<usize>,
    pub seed: Option<u64>,
    pub test_fraction: Option<f64>,
    pub variants: Vec<String>,
    pub no_boost: bool,
    pub neural: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    })
}

fn apply_overrides(mut config: PipelineConfig, overrides: RunOverrides) -> PipelineConfig {
    if let Some(k) = overrides.neighbors {
        config = config.with_n_neighbors(k);
    }
    if overrides.seed.is_some() || overrides.test_fraction.is_some() {
        let fraction = overrides.test_fraction.unwrap_or(config.split.test_fraction);
        let seed = overrides.seed.unwrap_or(config.split.seed);
        config = config.with_split(fraction, seed);
    }
    if !overrides.variants.is_empty() {
        config = config.with_variants(overrides.variants);
    }
    if overrides.no_boost {
        config = config.with_boosting(false);
    }
    if overrides.neural {
        let mut roster = config.roster.clone();
        roster.extend(neural_roster());
        config = config.with_roster(roster);
    }
    config
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    overrides: RunOverrides,
) -> anyhow::Result<()> {
    let config = apply_overrides(load_config(config_path)?, overrides);
    let pipeline = Pipeline::new(config)?;

    section("Run");
    step_run("Loading data");
    let start = Instant::now();
    let data = pipeline.load(data_path)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        data.n_rows(),
        data.n_features(),
        start.elapsed()
    ));

    step_run("Transforming, imputing and evaluating");
    let report = pipeline.run_dataset(&data)?;
    step_done(&format!("{:.1}s", report.elapsed_secs));

    print_report(&report);

    if let Some(path) = output {
        report.write_json(path)?;
        println!("  {} {}", ok("✓"), format!("report written to {}", path.display()).white());
        println!();
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    section("Variants");
    for v in &report.variants {
        let status = match (&v.error, v.evaluated) {
            (Some(e), _) => e.as_str().red().to_string(),
            (None, true) => ok("evaluated").to_string(),
            (None, false) => dim("imputed").to_string(),
        };
        println!(
            "  {:<18} {:>5} cells  {}",
            v.variant,
            v.imputed_cells,
            status
        );
        if !v.unresolved.is_empty() {
            println!("  {:<18} {}", "", format!("unresolved: {}", v.unresolved.join(", ")).yellow());
        }
        if let Some(cell) = &v.uncomparable {
            println!(
                "  {:<18} {}",
                "",
                format!("no comparable donor: row {}, {}", cell.row, cell.attribute).yellow()
            );
        }
    }

    for v in report.variants.iter().filter(|v| v.evaluated) {
        section(&format!("Held-out accuracy · {}", v.variant));
        println!(
            "  {:<28} {:>10} {:>10} {:>6}",
            muted("Classifier"),
            muted("Best"),
            muted("Full"),
            muted("c")
        );
        for classifier in report.table.classifiers() {
            if classifier.starts_with(BOOSTED_PREFIX) {
                continue;
            }
            let curve = report.table.curve(&v.variant, &classifier, SplitKind::Test);
            let Some(&(best_c, best)) = curve
                .iter()
                .fold(None, |acc: Option<&(usize, f64)>, p| match acc {
                    Some(a) if a.1 >= p.1 => Some(a),
                    _ => Some(p),
                })
            else {
                continue;
            };
            let full = curve.last().map(|p| format!("{:.4}", p.1)).unwrap_or_default();
            println!(
                "  {:<28} {:>10} {:>10} {:>6}",
                classifier,
                format!("{:.4}", best).white().bold(),
                full,
                best_c
            );
        }

        let boosted: Vec<_> = report
            .table
            .iter()
            .filter(|(k, _)| k.variant == v.variant && k.classifier.starts_with(BOOSTED_PREFIX))
            .collect();
        if !boosted.is_empty() {
            println!();
            for (key, acc) in boosted {
                println!("  {:<28} {:>10}", key.classifier, format!("{:.4}", acc).white().bold());
            }
        }
    }

    println!();
    line_box_top();
    line_box_empty();
    match report.best_held_out() {
        Some((key, acc)) => {
            let reduction = match key.reduction.components() {
                Some(c) => format!("{} components", c),
                None => "no reduction".to_string(),
            };
            line_box_center(&format!("{}", "Best held-out combination".white().bold()));
            line_box_empty();
            line_box_sep();
            line_box_empty();
            line_box(&kv("Variant    ", &key.variant));
            line_box(&kv("Classifier ", &key.classifier));
            line_box(&kv("Reduction  ", &reduction));
            line_box(&kv("Accuracy   ", &format!("{:.4}", acc)));
        }
        None => line_box_center(&format!("{}", "No evaluation records".yellow())),
    }
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Records    ", &report.table.len().to_string()));
    line_box(&kv("Failures   ", &report.failures.len().to_string()));
    line_box(&kv("Flags      ", &report.flags.len().to_string()));
    line_box_empty();
    line_box_bottom();
    println!();

    for failure in &report.failures {
        println!(
            "  {} {} / {} {:?}: {}",
            "✗".red(),
            failure.variant,
            failure.classifier,
            failure.reduction,
            dim(&failure.message)
        );
    }
    for flag in &report.flags {
        println!(
            "  {} {} / {}: train accuracy {:.4} at {} components, {:.4} at {}",
            "!".yellow(),
            flag.variant,
            flag.classifier,
            flag.full_accuracy,
            flag.full_components,
            flag.best_accuracy,
            flag.best_components
        );
    }
}

pub fn cmd_inspect(data_path: &Path) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(PipelineConfig::default())?;

    section("Inspect");
    let data = pipeline.load(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), data.n_rows());
    println!("  {:<12} {}", muted("Numeric"), data.n_numeric());
    println!("  {:<12} {}", muted("Categorical"), data.n_features() - data.n_numeric());
    println!("  {:<12} {}", muted("Missing"), data.total_missing());
    println!();

    println!("  {:<28} {:>8} {:>10}", muted("Attribute"), muted("Missing"), muted("Fraction"));
    println!("  {}", dim(&"─".repeat(50)));
    for summary in data.missing_summary() {
        let fraction = format!("{:.1}%", summary.fraction * 100.0);
        let fraction = if summary.fraction > 0.25 {
            fraction.yellow()
        } else {
            fraction.normal()
        };
        println!("  {:<28} {:>8} {:>10}", summary.attribute, summary.missing, fraction);
    }
    println!();
    Ok(())
}

pub fn cmd_impute(
    data_path: &Path,
    config_path: Option<&Path>,
    neighbors: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(k) = neighbors {
        config = config.with_n_neighbors(k);
    }
    let pipeline = Pipeline::new(config)?;

    section("Impute");
    let data = pipeline.load(data_path)?;

    step_run(&format!(
        "Imputing {} variants with k = {}",
        pipeline.config().transforms.strategies().len() + 1,
        pipeline.config().imputation.n_neighbors
    ));
    let start = Instant::now();
    let imputed = pipeline.transform_and_impute(&data)?;
    step_done(&format!("{:?}", start.elapsed()));
    println!();

    for (variant, result) in &imputed {
        match result {
            Ok(ds) if ds.is_complete() => println!(
                "  {} {:<18} {} cells",
                ok("✓"),
                variant.id,
                ds.imputed_cells
            ),
            Ok(ds) => println!(
                "  {} {:<18} {} cells, unresolved: {}",
                "!".yellow(),
                variant.id,
                ds.imputed_cells,
                ds.unresolved.join(", ")
            ),
            Err(e) => println!("  {} {:<18} {}", "✗".red(), variant.id, e.to_string().red()),
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_overrides() {
        let cli = Cli::parse_from([
            "ckd-automl",
            "run",
            "-d",
            "kidney.csv",
            "-k",
            "5",
            "--variants",
            "identity,standard",
            "--no-boost",
        ]);
        match cli.command {
            Commands::Run {
                neighbors,
                variants,
                no_boost,
                neural,
                ..
            } => {
                assert_eq!(neighbors, Some(5));
                assert_eq!(variants, vec!["identity", "standard"]);
                assert!(no_boost);
                assert!(!neural);
            }
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let config = apply_overrides(
            PipelineConfig::default(),
            RunOverrides {
                neighbors: Some(3),
                seed: Some(99),
                neural: true,
                ..Default::default()
            },
        );
        assert_eq!(config.imputation.n_neighbors, 3);
        assert_eq!(config.split.seed, 99);
        assert_eq!(config.split.test_fraction, 0.2);
        assert_eq!(config.roster.len(), 13);
        assert!(config.boosting.enabled);
    }

    #[test]
    fn test_strip_ansi() {
        let styled = format!("{}", "x".red());
        assert_eq!(strip_ansi(&styled), "x");
    }
}
