// src/main.rs
// Batch command-line application for DRS Reader

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use glob::glob;
use tracing::info;
use tracing_subscriber::EnvFilter;

use drs_reader::batch::{process_batch, DEFAULT_WORKERS};
use drs_reader::slow_control::{self, MonitoringSeries};

#[derive(Debug, FromArgs)]
/// Decode DRS binary waveform files into per-event CSV summaries.
struct CliArgs {
    /// directory containing the .dat binary files
    #[argh(option, short = 'b')]
    binaryfile: String,
    /// directory containing slow-control .csv files
    #[argh(option, short = 'c')]
    csvpath: Option<String>,
    /// output directory
    #[argh(option, short = 'o', default = "String::from(\"processed\")")]
    outdir: String,
    /// number of parallel workers
    #[argh(option, short = 'j', default = "DEFAULT_WORKERS")]
    jobs: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: CliArgs = argh::from_env();

    let mut inputs: Vec<PathBuf> = glob(&format!("{}/*.dat", args.binaryfile))
        .context("bad binary file pattern")?
        .filter_map(|entry| entry.ok())
        .collect();
    inputs.sort();
    if inputs.is_empty() {
        bail!("no .dat files found in {}", args.binaryfile);
    }

    let series = match &args.csvpath {
        Some(dir) => load_monitoring(dir)?,
        None => MonitoringSeries::default(),
    };
    if series.is_empty() {
        info!("no monitoring data, events will carry no bias fields");
    } else {
        info!(samples = series.len(), "loaded monitoring series");
    }

    let report = process_batch(&inputs, Path::new(&args.outdir), &series, args.jobs)?;
    info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "batch complete"
    );

    if !report.failed.is_empty() {
        for (path, e) in &report.failed {
            eprintln!("failed: {}: {}", path.display(), e);
        }
        bail!("{} file(s) failed", report.failed.len());
    }
    Ok(())
}

/// Load and merge every monitoring CSV in `dir`, sorted by timestamp.
fn load_monitoring(dir: &str) -> Result<MonitoringSeries> {
    let mut samples = Vec::new();
    for entry in glob(&format!("{}/*.csv", dir)).context("bad csv pattern")? {
        let path = entry?;
        let mut rdr = csv::Reader::from_path(&path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let rows = slow_control::read_csv(&mut rdr)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        samples.extend(rows);
    }
    Ok(MonitoringSeries::from_samples(samples))
}
