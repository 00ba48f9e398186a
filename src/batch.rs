// Parallel batch processing of independent files.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel;
use tracing::{error, info};

use crate::drs_tools::{process_file, RunSummary};
use crate::sink::CsvEventSink;
use crate::slow_control::MonitoringSeries;
use crate::{DrsError, Result};

/// Default worker-pool size.
pub const DEFAULT_WORKERS: usize = 5;

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files decoded in this run, with their summaries.
    pub processed: Vec<(PathBuf, RunSummary)>,
    /// Files skipped because their output already exists.
    pub skipped: Vec<PathBuf>,
    /// Files whose decode failed; other files are unaffected.
    pub failed: Vec<(PathBuf, DrsError)>,
}

/// Output path for one input file: `<out_dir>/<stem>.csv`.
pub fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    out_dir.join(stem).with_extension("csv")
}

/// Decode a set of files on a fixed-size worker pool.
///
/// Files are independent: each worker runs the fully sequential single-file
/// pipeline with no shared mutable state, and a fatal error in one file never
/// affects its siblings. Inputs whose output file already exists are skipped
/// up front, making re-runs idempotent. On a fatal decode error the partial
/// output file is removed so a later re-run picks the file up again.
pub fn process_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    series: &MonitoringSeries,
    workers: usize,
) -> Result<BatchReport> {
    fs::create_dir_all(out_dir)?;

    let mut report = BatchReport::default();
    let mut queue = Vec::new();
    for input in inputs {
        if output_path(out_dir, input).exists() {
            info!(file = %input.display(), "output exists, skipping");
            report.skipped.push(input.clone());
        } else {
            queue.push(input.clone());
        }
    }

    let (job_tx, job_rx) = channel::unbounded::<PathBuf>();
    let (result_tx, result_rx) = channel::unbounded();
    for input in queue {
        // Receivers outlive the senders; send cannot fail here.
        let _ = job_tx.send(input);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(input) = job_rx.recv() {
                    let output = output_path(out_dir, &input);
                    let result = process_one(&input, &output, series);
                    if result.is_err() {
                        // Never leave a partially written output behind.
                        let _ = fs::remove_file(&output);
                    }
                    let _ = result_tx.send((input, result));
                }
            });
        }
        drop(result_tx);
    });

    for (input, result) in result_rx.iter() {
        match result {
            Ok(summary) => report.processed.push((input, summary)),
            Err(e) => {
                error!(file = %input.display(), error = %e, "file failed");
                report.failed.push((input, e));
            }
        }
    }
    Ok(report)
}

fn process_one(input: &Path, output: &Path, series: &MonitoringSeries) -> Result<RunSummary> {
    info!(file = %input.display(), "processing");
    let mut sink = CsvEventSink::create(output)?;
    process_file(input, series, &mut sink)
}
