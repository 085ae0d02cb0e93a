//! DAB Scan - sequential channel scan over the DAB channel plan
//!
//! Walks Band III and L-band, checks each channel for signal presence,
//! waits for sync where a signal is found, and reports every ensemble and
//! its services as JSON. Progress goes to stderr, the report to stdout or
//! `SCAN_REPORT_PATH`.

mod catalog;
mod config;
mod engine;
mod error;
mod report;
mod scan;
mod sim;

use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use catalog::Catalog;
use config::Config;
use scan::{ChannelOutcome, ScanOptions, Scanner};
use sim::{Script, SimFactory, SimTuner};

fn main() -> Result<()> {
    // Initialize logging (stderr, stdout carries the report)
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!("===========================================");
    info!("   DAB Scan - Band III / L-band");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    info!("  Sync timeout: {} s", config.sync_timeout.as_secs());
    info!("  Bands: {:?}", config.bands);
    info!("  Script: {}", config.script_path.display());
    info!(
        "  Report: {}",
        config
            .report_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    );

    let script = Script::load(&config.script_path)
        .with_context(|| format!("Failed to load script {}", config.script_path.display()))?;
    info!("  Transmitters on air: {}", script.transmitters.len());

    let catalog = Catalog::for_band(config.bands);
    if catalog.is_empty() {
        bail!("No channels to scan for {:?}", config.bands);
    }
    let mut frequencies = catalog.iter().map(|c| c.frequency_hz);
    let lowest = frequencies.next().unwrap_or(0);
    let highest = frequencies.last().unwrap_or(lowest);
    info!(
        "  Channels: {} ({:.3} - {:.3} MHz)",
        catalog.len(),
        lowest as f64 / 1e6,
        highest as f64 / 1e6
    );
    let tuner = Arc::new(SimTuner::new());
    let scanner = Scanner::new(
        catalog,
        tuner.clone(),
        SimFactory::new(script),
        ScanOptions::from(&config),
    );

    let report = scanner.run().context("Channel scan failed")?;

    match &config.report_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            report::write_report(&report, BufWriter::new(file))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => {
            report::write_report(&report, io::stdout().lock()).context("Failed to write report")?;
        }
    }

    let no_sync = report
        .outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == ChannelOutcome::NoSync)
        .count();
    let stats = scanner.factory().stats();
    info!(
        "Shutdown complete. Channels: {}, ensembles: {}, signal without sync: {}",
        scanner.catalog().len(),
        report.results.len(),
        no_sync
    );
    info!(
        "  Engine instances: {} created, {} started, {} stopped, {} events delivered",
        stats.created(),
        stats.started(),
        stats.stopped(),
        stats.delivered()
    );
    info!("  Tuner: {} retunes, {} buffer resets", tuner.retunes(), tuner.resets());
    Ok(())
}
