//! Analog pulse-shape model.
//!
//! The preamplifier response to a charge injection is approximated by two
//! Gaussian lobes sharing one peak: a narrow one set by the rise time and a
//! wider one set by the fall time. Rise and fall are given as "visual"
//! 3-sigma times, so each lobe's sigma is a third of the configured value.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]

use serde::{Deserialize, Serialize};

/// Upper bound on the number of samples taken when scanning a waveform.
const MAX_WAVEFORM_SAMPLES: usize = 1 << 20;

/// Lobe widths scanned on each side of the peaks.
const SCAN_SIGMAS: f64 = 5.0;

/// Pulse-shape parameters of a readout channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseShape {
    /// Delay between the energy deposit and the start of the signal (ns).
    pub delay: f64,
    /// 3-sigma rise time (ns).
    pub rise: f64,
    /// 3-sigma fall time (ns).
    pub fall: f64,
    /// Signal amplitude per unit deposited energy (mV/MeV).
    pub amplitude_scale: f64,
}

impl PulseShape {
    /// Creates a pulse shape from explicit parameters.
    #[must_use]
    pub fn new(delay: f64, rise: f64, fall: f64, amplitude_scale: f64) -> Self {
        Self {
            delay,
            rise,
            fall,
            amplitude_scale,
        }
    }

    /// Creates a pulse shape from the `[delay, rise, fall, amplitude]` layout
    /// used by calibration tables.
    #[must_use]
    pub fn from_array(par: [f64; 4]) -> Self {
        Self::new(par[0], par[1], par[2], par[3])
    }

    /// Time at which a signal started by a step at `step_time` peaks.
    #[inline]
    #[must_use]
    pub fn peak_time(&self, step_time: f64) -> f64 {
        // t0 + 3 * (rise / 3)
        self.delay + step_time + self.rise
    }

    /// Voltage at `t` produced by `edep` deposited at `step_time`.
    #[inline]
    #[must_use]
    pub fn voltage(&self, t: f64, edep: f64, step_time: f64) -> f64 {
        dgauss(t, self, edep, step_time)
    }
}

/// Double-Gaussian-with-delay pulse.
///
/// Returns the (negative) voltage at time `t` for an energy `edep` deposited
/// at `step_time`. Pure closed-form arithmetic; never fails.
#[inline]
#[must_use]
pub fn dgauss(t: f64, shape: &PulseShape, edep: f64, step_time: f64) -> f64 {
    let t0 = shape.delay + step_time;
    let rise = shape.rise / 3.0;
    let fall = shape.fall / 3.0;
    // Two lobes share the amplitude.
    let amplitude = edep * shape.amplitude_scale / 2.0;
    let peak = t0 + 3.0 * rise;

    let r = (t - peak) / rise;
    let f = (t - peak) / fall;
    -amplitude * (-0.5 * r * r).exp() - amplitude * (-0.5 * f * f).exp()
}

/// An energy-equivalent charge arriving on a channel at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    /// Deposited-energy equivalent of the charge (MeV).
    pub edep: f64,
    /// Arrival time (ns).
    pub time: f64,
}

impl Deposit {
    /// Creates a deposit.
    #[must_use]
    pub fn new(edep: f64, time: f64) -> Self {
        Self { edep, time }
    }
}

/// Summed voltage of several deposits on the same channel at time `t`.
#[must_use]
pub fn summed_voltage(t: f64, shape: &PulseShape, deposits: &[Deposit]) -> f64 {
    deposits
        .iter()
        .map(|d| dgauss(t, shape, d.edep, d.time))
        .sum()
}

/// Characteristics of a summed waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseFeatures {
    /// Most negative voltage reached (mV).
    pub peak_voltage: f64,
    /// Time of the extremum (ns).
    pub peak_time: f64,
    /// First time the waveform crosses `threshold_fraction * peak_voltage` (ns).
    pub leading_time: f64,
}

/// Scans the summed waveform of `deposits` and extracts its peak and
/// leading-edge time.
///
/// The waveform is sampled every `sample_step` ns from five lobe widths before
/// the earliest peak to five lobe widths after the latest one. The leading
/// edge is linearly interpolated between samples. Spans needing more than
/// `MAX_WAVEFORM_SAMPLES` samples are scanned with a coarser step. Returns
/// `None` when the waveform is identically zero.
#[must_use]
pub fn pulse_features(
    shape: &PulseShape,
    deposits: &[Deposit],
    sample_step: f64,
    threshold_fraction: f64,
) -> Option<PulseFeatures> {
    if deposits.iter().all(|d| d.edep == 0.0) || sample_step.is_nan() || sample_step <= 0.0 {
        return None;
    }

    let width = shape.rise.max(shape.fall) / 3.0 * SCAN_SIGMAS;
    let (first, last) = deposits
        .iter()
        .map(|d| shape.peak_time(d.time))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        });
    let start = first - width;
    let span = (last + width) - start;
    let wanted = (span / sample_step).ceil() as usize + 1;
    let (n_samples, step) = if wanted > MAX_WAVEFORM_SAMPLES {
        let coarse = span / (MAX_WAVEFORM_SAMPLES - 1) as f64;
        log::warn!(
            "waveform spans {span:.1} ns: sampling every {coarse:.3} ns instead of {sample_step} ns"
        );
        (MAX_WAVEFORM_SAMPLES, coarse)
    } else {
        (wanted, sample_step)
    };

    let samples: Vec<(f64, f64)> = (0..n_samples)
        .map(|i| {
            let t = start + i as f64 * step;
            (t, summed_voltage(t, shape, deposits))
        })
        .collect();

    let (peak_time, peak_voltage) = samples
        .iter()
        .copied()
        .fold((start, 0.0_f64), |best, s| if s.1 < best.1 { s } else { best });
    if peak_voltage == 0.0 {
        return None;
    }

    let threshold = threshold_fraction * peak_voltage;
    let crossing = samples.iter().position(|&(_, v)| v <= threshold)?;
    let leading_time = if crossing == 0 {
        samples[0].0
    } else {
        let (t_a, v_a) = samples[crossing - 1];
        let (t_b, v_b) = samples[crossing];
        if (v_b - v_a).abs() > f64::EPSILON {
            t_a + (threshold - v_a) / (v_b - v_a) * (t_b - t_a)
        } else {
            t_b
        }
    };

    Some(PulseFeatures {
        peak_voltage,
        peak_time,
        leading_time,
    })
}
