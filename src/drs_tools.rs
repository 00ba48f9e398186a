// DRS Reader central module: error taxonomy and the single-file pipeline.

use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use crate::cursor::ByteCursor;
use crate::event::EventDecoder;
use crate::header;
use crate::sink::EventSink;
use crate::slow_control::MonitoringSeries;

#[derive(Error, Debug)]
pub enum DrsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed header: expected {expected:?}, found {found:?}")]
    MalformedHeader { expected: String, found: String },

    #[error("board #{0} has no channels")]
    EmptyBoard(u16),

    #[error("unsupported topology: expected exactly 1 board, found {0}")]
    UnsupportedTopology(usize),

    #[error("corrupt event stream at byte {offset}: {reason}")]
    CorruptEventStream { offset: usize, reason: String },

    #[error("unexpected end of stream at byte {offset}, needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, DrsError>;

/// End-of-run accounting for one decoded file.
#[derive(Clone, Copy, Debug)]
pub struct RunSummary {
    /// Number of complete events emitted.
    pub events: u64,
    /// Mean spacing between consecutive samples across all reconstructed
    /// traces, in calibration time units.
    pub mean_sample_spacing: Option<f64>,
    /// Wall-clock time of the first and last event, in file order.
    pub first_event: Option<NaiveDateTime>,
    pub last_event: Option<NaiveDateTime>,
}

impl RunSummary {
    /// Measured sampling rate, the reciprocal of the mean sample spacing.
    pub fn sampling_rate(&self) -> Option<f64> {
        self.mean_sample_spacing
            .filter(|&s| s > 0.0)
            .map(|s| 1.0 / s)
    }

    /// Run length in seconds between the first and last event.
    pub fn wall_clock_secs(&self) -> Option<f64> {
        match (self.first_event, self.last_event) {
            (Some(first), Some(last)) => {
                Some((last - first).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// Events per second over the run's wall-clock span.
    pub fn event_rate(&self) -> Option<f64> {
        self.wall_clock_secs()
            .filter(|&secs| secs > 0.0)
            .map(|secs| self.events as f64 / secs)
    }
}

/// Decode one file from an in-memory buffer, emitting each event to `sink`.
///
/// Runs the full pipeline: header decoding, per-event record decoding, trace
/// reconstruction, feature extraction and slow-control correlation. A fatal
/// decode error aborts the whole file; the sink is only finalized on success.
pub fn process_bytes(
    bytes: &[u8],
    series: &MonitoringSeries,
    sink: &mut dyn EventSink,
) -> Result<RunSummary> {
    let mut cursor = ByteCursor::new(bytes);
    let board = header::decode_header(&mut cursor)?;
    info!(
        board_id = board.board_id,
        channels = board.n_channels(),
        "decoded file header"
    );

    let mut decoder = EventDecoder::new(cursor, &board, series);
    while let Some(record) = decoder.decode_next()? {
        sink.append(&record)?;
    }
    sink.finish()?;

    let summary = decoder.summary();
    if let Some(rate) = summary.sampling_rate() {
        info!(rate_ghz = rate, "measured sampling rate");
    }
    if let (Some(secs), Some(rate)) = (summary.wall_clock_secs(), summary.event_rate()) {
        info!(
            events = summary.events,
            run_secs = secs,
            event_rate_hz = rate,
            "run complete"
        );
    } else {
        info!(events = summary.events, "run complete");
    }
    Ok(summary)
}

/// Read and decode one file from disk. See [`process_bytes`].
pub fn process_file(
    path: impl AsRef<Path>,
    series: &MonitoringSeries,
    sink: &mut dyn EventSink,
) -> Result<RunSummary> {
    let bytes = fs::read(path)?;
    process_bytes(&bytes, series, sink)
}
