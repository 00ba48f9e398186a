// src/lib.rs
// DRS Reader Library - Public API

//! # DRS Reader
//!
//! A Rust library for decoding binary waveform files written by DRS
//! evaluation-board digitizers.
//!
//! ## Features
//!
//! - Decode the `DRS2` container: board/channel discovery and per-channel
//!   timing calibration tables
//! - Reconstruct per-event, per-channel calibrated time/voltage traces
//!   (non-uniform bins, rotated by the event trigger cell)
//! - Correlate events against a slow-control monitoring series by timestamp
//! - Extract per-channel pulse features (area, offset, noise, peak)
//! - Batch-process directories of files on a fixed worker pool
//! - Proper error handling
//!
//! ## Example
//!
//! ```no_run
//! use drs_reader::{process_file, MonitoringSeries, VecSink};
//!
//! let series = MonitoringSeries::default();
//! let mut sink = VecSink::default();
//! let summary = process_file("run042.dat", &series, &mut sink)
//!     .expect("failed to decode file");
//!
//! println!("Decoded {} events", summary.events);
//! if let Some(rec) = sink.records.first() {
//!     println!("First trigger cell: {}", rec.header.trigger_cell);
//! }
//! ```

pub mod batch;
pub mod cursor;
pub mod drs_tools;
pub mod event;
pub mod features;
pub mod header;
pub mod sink;
pub mod slow_control;
pub mod trace;

pub use batch::{process_batch, BatchReport};
pub use cursor::ByteCursor;
pub use drs_tools::{process_bytes, process_file, DrsError, Result, RunSummary};
pub use event::{ChannelReadout, EventDecoder, EventHeader, EventRecord};
pub use features::{ChannelFeatures, FeatureError};
pub use header::{BoardDescriptor, ChannelCalibration};
pub use sink::{CsvEventSink, EventSink, VecSink};
pub use slow_control::{MonitoringSample, MonitoringSeries};
pub use trace::CalibratedTrace;

/// Number of timing bins per channel, fixed by the digitizer.
pub const N_BINS: usize = 1024;

/// Maximum number of channels multiplexed on one board.
pub const MAX_CHANNELS: usize = 4;
