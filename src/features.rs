// Per-channel pulse feature extraction.

use thiserror::Error;

use crate::trace::CalibratedTrace;

/// Number of leading samples used to estimate the baseline.
pub const PEDESTAL_WINDOW: usize = 100;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("insufficient data: {0} samples")]
    InsufficientData(usize),
}

/// Summary quantities for one channel of one event.
#[derive(Clone, Copy, Debug)]
pub struct ChannelFeatures {
    /// Baseline-subtracted trapezoidal integral of the waveform.
    pub area: f64,
    /// Baseline estimate, the mean of the leading pedestal window.
    pub offset: f64,
    /// RMS of the pedestal window around the baseline.
    pub noise: f64,
    /// Time of the sample with the largest excursion from the baseline.
    pub peak_time: f64,
    /// Voltage of that sample.
    pub peak_voltage: f64,
}

/// Extract pulse features from one calibrated trace.
///
/// Fails with [`FeatureError::InsufficientData`] when the trace is too short
/// to estimate a baseline; the event decoder treats that as a per-channel
/// skip, not a fatal error.
pub fn extract(trace: &CalibratedTrace) -> Result<ChannelFeatures, FeatureError> {
    let n = trace.voltages.len();
    if n <= PEDESTAL_WINDOW {
        return Err(FeatureError::InsufficientData(n));
    }

    let pedestal = &trace.voltages[..PEDESTAL_WINDOW];
    let offset = pedestal.iter().sum::<f64>() / PEDESTAL_WINDOW as f64;
    let noise = (pedestal.iter().map(|v| (v - offset).powi(2)).sum::<f64>()
        / PEDESTAL_WINDOW as f64)
        .sqrt();

    let mut area = 0.0;
    for i in 1..n {
        let dt = trace.times[i] - trace.times[i - 1];
        area += 0.5 * dt * ((trace.voltages[i] - offset) + (trace.voltages[i - 1] - offset));
    }

    let mut peak_idx = 0;
    let mut peak_excursion = 0.0;
    for (i, &v) in trace.voltages.iter().enumerate() {
        let excursion = (v - offset).abs();
        if excursion > peak_excursion {
            peak_excursion = excursion;
            peak_idx = i;
        }
    }

    Ok(ChannelFeatures {
        area,
        offset,
        noise,
        peak_time: trace.times[peak_idx],
        peak_voltage: trace.voltages[peak_idx],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_from(voltages: Vec<f64>) -> CalibratedTrace {
        let times = (0..voltages.len()).map(|i| i as f64).collect();
        CalibratedTrace {
            channel: 1,
            times,
            voltages,
        }
    }

    #[test]
    fn test_too_short_trace() {
        let trace = trace_from(vec![0.0; PEDESTAL_WINDOW]);
        assert!(matches!(
            extract(&trace),
            Err(FeatureError::InsufficientData(n)) if n == PEDESTAL_WINDOW
        ));
    }

    #[test]
    fn test_flat_trace() {
        let trace = trace_from(vec![42.0; 1024]);
        let f = extract(&trace).unwrap();
        assert!((f.offset - 42.0).abs() < 1e-12);
        assert!(f.noise.abs() < 1e-12);
        assert!(f.area.abs() < 1e-9);
        assert_eq!(f.peak_voltage, 42.0);
    }

    #[test]
    fn test_pulse_peak_and_area() {
        let mut voltages = vec![-10.0; 1024];
        // Rectangular pulse of height 90 mV above baseline, 10 samples wide.
        for v in voltages.iter_mut().skip(500).take(10) {
            *v = 80.0;
        }
        let trace = trace_from(voltages);
        let f = extract(&trace).unwrap();
        assert!((f.offset + 10.0).abs() < 1e-12);
        assert_eq!(f.peak_voltage, 80.0);
        assert_eq!(f.peak_time, 500.0);
        // Trapezoidal integral: 9 full-height intervals plus two half ramps.
        assert!((f.area - 90.0 * 10.0).abs() < 1.0);
    }
}
