use anyhow::{bail, Context, Result};
use clap::Parser;
use doctree::batch::convert_paths;
use doctree::{validate, DoctreeService};
use log::{error, info, warn, LevelFilter};

mod cli;
mod config;

use cli::Cli;
use config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    // Load the config file if given, then let CLI arguments override it
    let mut config = if let Some(config_path) = &cli.config_file {
        info!("Loading configuration from {}", config_path.display());
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };
    config.merge_with_cli(&cli);

    let service = DoctreeService::with_options(config.doctree_options());
    let report = convert_paths(&service, &cli.inputs, &config.batch_options());

    if config.check {
        let mut issues = 0;
        for converted in &report.converted {
            for issue in validate(&converted.document) {
                warn!("{}: {issue}", converted.source.display());
                issues += 1;
            }
        }
        info!(
            "Checked {} documents, {issues} issues found",
            report.converted.len()
        );
    }

    info!("Converted {} documents", report.converted.len());
    if !report.is_success() {
        for (path, err) in &report.failed {
            error!("{}: {err}", path.display());
        }
        bail!("{} source files failed to convert", report.failed.len());
    }

    Ok(())
}
