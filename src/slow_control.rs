// Slow-control monitoring series and timestamp correlation.

use std::io::Read;

use crate::{DrsError, Result};

/// One slow-control reading: bias voltage and current at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonitoringSample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub high_voltage: f64,
    pub current: f64,
}

/// A time-ordered sequence of slow-control readings, immutable for the
/// duration of a file's processing and shareable read-only across concurrent
/// file jobs.
#[derive(Clone, Debug, Default)]
pub struct MonitoringSeries {
    samples: Vec<MonitoringSample>,
}

impl MonitoringSeries {
    /// Build a series from unordered samples; sorts by timestamp.
    pub fn from_samples(mut samples: Vec<MonitoringSample>) -> Self {
        samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        MonitoringSeries { samples }
    }

    /// Build a series from three aligned columns, as handed over by the
    /// external readings parser.
    pub fn from_columns(
        timestamps: &[f64],
        high_voltages: &[f64],
        currents: &[f64],
    ) -> Result<Self> {
        if timestamps.len() != high_voltages.len() || timestamps.len() != currents.len() {
            return Err(DrsError::ParseError(format!(
                "misaligned monitoring columns: {} timestamps, {} voltages, {} currents",
                timestamps.len(),
                high_voltages.len(),
                currents.len()
            )));
        }
        let samples = timestamps
            .iter()
            .zip(high_voltages)
            .zip(currents)
            .map(|((&timestamp, &high_voltage), &current)| MonitoringSample {
                timestamp,
                high_voltage,
                current,
            })
            .collect();
        Ok(Self::from_samples(samples))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Find the reading in effect at event time `t`: the latest sample whose
    /// timestamp is strictly before `t`. A sample taken exactly at `t` is not
    /// used (the reading boundary is strictly-greater, not at-or-after).
    /// Returns `None` when the series is empty or `t` does not come after any
    /// sample, in which case the event carries no monitoring fields.
    pub fn correlate(&self, t: f64) -> Option<&MonitoringSample> {
        let k = self.samples.partition_point(|s| s.timestamp < t);
        if k == 0 {
            None
        } else {
            Some(&self.samples[k - 1])
        }
    }
}

/// Read monitoring samples from comma-separated `timestamp,voltage,current`
/// rows. The first row is treated as a header.
pub fn read_csv(rdr: &mut csv::Reader<impl Read>) -> Result<Vec<MonitoringSample>> {
    let mut samples = Vec::new();
    for result in rdr.records() {
        let record = result?;
        samples.push(MonitoringSample {
            timestamp: parse_field(&record, 0)?,
            high_voltage: parse_field(&record, 1)?,
            current: parse_field(&record, 2)?,
        });
    }
    Ok(samples)
}

fn parse_field(record: &csv::StringRecord, index: usize) -> Result<f64> {
    let raw = record.get(index).ok_or_else(|| {
        DrsError::ParseError(format!(
            "monitoring row has {} fields, expected at least {}",
            record.len(),
            index + 1
        ))
    })?;
    raw.trim()
        .parse()
        .map_err(|e| DrsError::ParseError(format!("bad monitoring value {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> MonitoringSeries {
        MonitoringSeries::from_columns(&[0.0, 10.0, 20.0], &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0])
            .unwrap()
    }

    #[test]
    fn test_correlate_between_samples() {
        let s = series();
        assert_eq!(s.correlate(5.0).unwrap().high_voltage, 1.0);
        assert_eq!(s.correlate(15.0).unwrap().high_voltage, 2.0);
        assert_eq!(s.correlate(25.0).unwrap().high_voltage, 3.0);
    }

    #[test]
    fn test_correlate_boundary_is_strictly_greater() {
        let s = series();
        // An event at exactly a sample's timestamp still sees the reading
        // from the previous sample.
        assert_eq!(s.correlate(20.0).unwrap().high_voltage, 2.0);
        assert_eq!(s.correlate(10.0).unwrap().high_voltage, 1.0);
    }

    #[test]
    fn test_correlate_before_first_sample() {
        let s = series();
        assert!(s.correlate(-1.0).is_none());
        assert!(s.correlate(0.0).is_none());
    }

    #[test]
    fn test_correlate_empty_series() {
        let s = MonitoringSeries::default();
        assert!(s.correlate(100.0).is_none());
    }

    #[test]
    fn test_from_columns_misaligned() {
        let result = MonitoringSeries::from_columns(&[0.0, 1.0], &[1.0], &[1.0, 2.0]);
        assert!(matches!(result, Err(DrsError::ParseError(_))));
    }

    #[test]
    fn test_from_samples_sorts() {
        let s = MonitoringSeries::from_samples(vec![
            MonitoringSample {
                timestamp: 10.0,
                high_voltage: 2.0,
                current: 2.0,
            },
            MonitoringSample {
                timestamp: 0.0,
                high_voltage: 1.0,
                current: 1.0,
            },
        ]);
        assert_eq!(s.correlate(5.0).unwrap().high_voltage, 1.0);
    }

    #[test]
    fn test_read_csv() {
        let data = "timestamp,voltage,current\n100.5,55.0,0.2\n200.0,56.0,0.3\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let samples = read_csv(&mut rdr).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, 100.5);
        assert_eq!(samples[1].current, 0.3);
    }

    #[test]
    fn test_read_csv_bad_value() {
        let data = "timestamp,voltage,current\nnot-a-number,55.0,0.2\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        assert!(matches!(
            read_csv(&mut rdr),
            Err(DrsError::ParseError(_))
        ));
    }
}
