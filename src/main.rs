//! CKD AutoML - Main Entry Point

use ckd_automl::cli::{cmd_impute, cmd_inspect, cmd_run, Cli, Commands, RunOverrides};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ckd_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            output,
            neighbors,
            seed,
            test_fraction,
            variants,
            no_boost,
            neural,
        } => {
            let overrides = RunOverrides {
                neighbors,
                seed,
                test_fraction,
                variants,
                no_boost,
                neural,
            };
            cmd_run(&data, config.as_deref(), output.as_deref(), overrides)?;
        }
        Commands::Inspect { data } => {
            cmd_inspect(&data)?;
        }
        Commands::Impute {
            data,
            config,
            neighbors,
        } => {
            cmd_impute(&data, config.as_deref(), neighbors)?;
        }
    }

    Ok(())
}
