// Event record decoding: the per-event state machine.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::cursor::ByteCursor;
use crate::features::{self, ChannelFeatures};
use crate::header::BoardDescriptor;
use crate::slow_control::{MonitoringSample, MonitoringSeries};
use crate::trace::{self, CalibratedTrace};
use crate::{DrsError, Result, N_BINS};

pub const EVENT_MARKER: &[u8; 4] = b"EHDR";

/// The producer's scope PC runs on a fixed UTC-7 clock with no
/// daylight-saving adjustment. Reproduced as-is for bit-for-bit parity with
/// existing processed output.
pub const UTC_OFFSET_HOURS: i64 = -7;

/// Events decoded between progress log lines.
const PROGRESS_INTERVAL: u64 = 10_000;

/// Per-event metadata decoded from an `EHDR` record.
#[derive(Clone, Debug)]
pub struct EventHeader {
    /// Event serial number, kept for diagnostics only.
    pub serial: u32,
    /// Event wall-clock time, shifted from the producer's local clock to UTC.
    pub datetime: NaiveDateTime,
    /// Seconds since the Unix epoch, millisecond resolution.
    pub timestamp: f64,
    /// Center of the digitizer's voltage range, in millivolts.
    pub range_center: i16,
    pub board_number: u16,
    /// Cell at which the circular capture buffer was armed (0-1023).
    pub trigger_cell: u16,
}

/// One successfully reconstructed channel of an event.
#[derive(Clone, Debug)]
pub struct ChannelReadout {
    pub trace: CalibratedTrace,
    pub features: ChannelFeatures,
}

/// A fully decoded event, handed to the output sink and then discarded.
///
/// `channels` holds one readout per discovered channel in file order, minus
/// any channel whose feature extraction failed (partial events are still
/// emitted). `bias` is absent when the monitoring series is empty or the
/// event precedes its first sample.
#[derive(Clone, Debug)]
pub struct EventRecord {
    pub header: EventHeader,
    pub channels: Vec<ChannelReadout>,
    pub bias: Option<MonitoringSample>,
}

/// Iterates event records until end-of-stream.
///
/// End-of-stream at an event boundary terminates the loop normally. A
/// truncated trailing record is dropped with a warning, keeping every event
/// decoded before it. A wrong event or channel tag is fatal for the whole
/// file: once the stream is misaligned nothing after it can be trusted.
pub struct EventDecoder<'a> {
    cursor: ByteCursor<'a>,
    board: &'a BoardDescriptor,
    series: &'a MonitoringSeries,
    finished: bool,
    events: u64,
    spacing_sum: f64,
    spacing_count: u64,
    first_time: Option<NaiveDateTime>,
    last_time: Option<NaiveDateTime>,
}

impl<'a> EventDecoder<'a> {
    pub fn new(
        cursor: ByteCursor<'a>,
        board: &'a BoardDescriptor,
        series: &'a MonitoringSeries,
    ) -> Self {
        EventDecoder {
            cursor,
            board,
            series,
            finished: false,
            events: 0,
            spacing_sum: 0.0,
            spacing_count: 0,
            first_time: None,
            last_time: None,
        }
    }

    /// Decode the next event, or `Ok(None)` at end-of-stream.
    pub fn decode_next(&mut self) -> Result<Option<EventRecord>> {
        if self.finished || self.cursor.is_empty() {
            self.finished = true;
            return Ok(None);
        }
        match self.decode_event() {
            Ok(record) => {
                if self.first_time.is_none() {
                    self.first_time = Some(record.header.datetime);
                }
                self.last_time = Some(record.header.datetime);
                self.events += 1;
                Ok(Some(record))
            }
            Err(DrsError::UnexpectedEof { offset, needed }) => {
                warn!(offset, needed, "truncated trailing event record, dropped");
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Number of events decoded so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn summary(&self) -> crate::RunSummary {
        crate::RunSummary {
            events: self.events,
            mean_sample_spacing: if self.spacing_count > 0 {
                Some(self.spacing_sum / self.spacing_count as f64)
            } else {
                None
            },
            first_event: self.first_time,
            last_event: self.last_time,
        }
    }

    fn decode_event(&mut self) -> Result<EventRecord> {
        let tag_offset = self.cursor.position();
        let tag = self.cursor.read_bytes(EVENT_MARKER.len())?;
        if tag != EVENT_MARKER {
            return Err(DrsError::CorruptEventStream {
                offset: tag_offset,
                reason: format!("bad event tag {:?}", String::from_utf8_lossy(tag)),
            });
        }
        if self.events % PROGRESS_INTERVAL == 0 {
            info!(event = self.events, "processing event");
        }

        let serial = self.cursor.read_u32()?;
        let date_offset = self.cursor.position();
        let date_fields = self.cursor.read_u16_array(7)?;
        let datetime = decode_datetime(&date_fields).ok_or_else(|| DrsError::CorruptEventStream {
            offset: date_offset,
            reason: format!("undecodable date fields {:?}", date_fields),
        })?;
        let timestamp = datetime.and_utc().timestamp_millis() as f64 / 1000.0;

        let range_center = self.cursor.read_u16()? as i16;
        self.cursor.skip(2)?;
        let board_number = self.cursor.read_u16()?;
        self.cursor.skip(2)?;
        let trigger_cell = self.cursor.read_u16()?;

        let header = EventHeader {
            serial,
            datetime,
            timestamp,
            range_center,
            board_number,
            trigger_cell,
        };

        let mut channels = Vec::with_capacity(self.board.n_channels());
        for cal in &self.board.channels {
            self.expect_channel_tag(cal.channel)?;
            let _scaler = self.cursor.read_u32()?;
            let raw = self.cursor.read_u16_array(N_BINS)?;

            let trace = trace::reconstruct(cal, trigger_cell, range_center, &raw);
            self.spacing_sum += trace.mean_spacing();
            self.spacing_count += 1;

            match features::extract(&trace) {
                Ok(feats) => channels.push(ChannelReadout {
                    trace,
                    features: feats,
                }),
                Err(e) => {
                    debug!(
                        serial,
                        channel = cal.channel,
                        error = %e,
                        "feature extraction failed, channel skipped"
                    );
                }
            }
        }

        let bias = self.series.correlate(timestamp).copied();

        Ok(EventRecord {
            header,
            channels,
            bias,
        })
    }

    fn expect_channel_tag(&mut self, channel: u8) -> Result<()> {
        let offset = self.cursor.position();
        let tag = self.cursor.read_bytes(4)?;
        let expected = [b'C', b'0', b'0', b'0' + channel];
        if tag != &expected {
            return Err(DrsError::CorruptEventStream {
                offset,
                reason: format!(
                    "bad channel tag {:?}, expected {:?}",
                    String::from_utf8_lossy(tag),
                    String::from_utf8_lossy(&expected)
                ),
            });
        }
        Ok(())
    }
}

/// Decode the 7 packed date/time fields (year, month, day, hour, minute,
/// second, millisecond) and apply the producer's fixed timezone correction.
fn decode_datetime(fields: &[u16]) -> Option<NaiveDateTime> {
    let local = NaiveDate::from_ymd_opt(fields[0] as i32, fields[1] as u32, fields[2] as u32)?
        .and_hms_milli_opt(
            fields[3] as u32,
            fields[4] as u32,
            fields[5] as u32,
            fields[6] as u32,
        )?;
    Some(local - Duration::hours(UTC_OFFSET_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_datetime_applies_fixed_offset() {
        let fields = [2021u16, 3, 14, 1, 59, 26, 535];
        let dt = decode_datetime(&fields).unwrap();
        // Producer local 01:59:26.535 at UTC-7 is 08:59:26.535 UTC.
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2021, 3, 14)
                .unwrap()
                .and_hms_milli_opt(8, 59, 26, 535)
                .unwrap()
        );
        assert_eq!(dt.and_utc().timestamp_millis(), 1_615_712_366_535);
    }

    #[test]
    fn test_decode_datetime_rejects_bad_fields() {
        assert!(decode_datetime(&[2021, 13, 1, 0, 0, 0, 0]).is_none());
        assert!(decode_datetime(&[2021, 2, 30, 0, 0, 0, 0]).is_none());
        assert!(decode_datetime(&[2021, 1, 1, 25, 0, 0, 0]).is_none());
    }
}
