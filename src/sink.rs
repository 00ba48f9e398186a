// Output sinks for decoded events.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::event::EventRecord;
use crate::{Result, MAX_CHANNELS};

/// Append-only destination for decoded events. The pipeline hands over one
/// [`EventRecord`] at a time and retains nothing after the call returns.
pub trait EventSink {
    fn append(&mut self, record: &EventRecord) -> Result<()>;

    /// Called once after the last event of a successfully decoded file.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink, mainly for tests and small files.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<EventRecord>,
}

impl EventSink for VecSink {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// CSV sink writing one summary row per event: metadata, bias readings and
/// the per-channel feature columns. Channel columns follow the historical
/// output naming (`area_CH1` .. `vMax_CH4`); channels missing from an event
/// leave their columns empty.
pub struct CsvEventSink<W: Write> {
    wtr: csv::Writer<W>,
}

impl CsvEventSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> CsvEventSink<W> {
    pub fn new(wtr: W) -> Result<Self> {
        let mut wtr = csv::Writer::from_writer(wtr);
        let mut columns = vec![
            "serial".to_string(),
            "timestamp".to_string(),
            "trigger_cell".to_string(),
            "bias_voltage".to_string(),
            "bias_current".to_string(),
        ];
        for chan in 1..=MAX_CHANNELS {
            for field in ["area", "offset", "noise", "tMax", "vMax"] {
                columns.push(format!("{}_CH{}", field, chan));
            }
        }
        wtr.write_record(&columns)?;
        Ok(CsvEventSink { wtr })
    }
}

impl<W: Write> EventSink for CsvEventSink<W> {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        let mut row = vec![
            record.header.serial.to_string(),
            format!("{:.3}", record.header.timestamp),
            record.header.trigger_cell.to_string(),
        ];
        match record.bias {
            Some(bias) => {
                row.push(bias.high_voltage.to_string());
                row.push(bias.current.to_string());
            }
            None => {
                row.push(String::new());
                row.push(String::new());
            }
        }
        for chan in 1..=MAX_CHANNELS as u8 {
            match record.channels.iter().find(|c| c.trace.channel == chan) {
                Some(readout) => {
                    let f = readout.features;
                    row.push(f.area.to_string());
                    row.push(f.offset.to_string());
                    row.push(f.noise.to_string());
                    row.push(f.peak_time.to_string());
                    row.push(f.peak_voltage.to_string());
                }
                None => row.extend(std::iter::repeat(String::new()).take(5)),
            }
        }
        self.wtr.write_record(&row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}
