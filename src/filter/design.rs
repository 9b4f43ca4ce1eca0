//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! For a band-pass between `l_freq` and `h_freq` Hz at sampling rate `sfreq`:
//!   • lower transition bandwidth = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • upper transition bandwidth = min(max(0.25 * h_freq, 2.0), sfreq/2 - h_freq)
//!   • filter length N = ceil(3.3 / min(bandwidths) * sfreq), rounded to odd
//!   • windowed-sinc design (Hamming window), cutoffs at the middle of each
//!     transition band
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pass band of a band-pass filter, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FilterBand {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Check `0 < low < high < sfreq / 2`.
    pub fn validate(&self, sfreq: f64) -> Result<()> {
        let nyq = sfreq / 2.0;
        if !(self.low_hz > 0.0 && self.low_hz < self.high_hz && self.high_hz < nyq) {
            return Err(Error::InvalidFilter(format!(
                "need 0 < low ({}) < high ({}) < Nyquist ({nyq})",
                self.low_hz, self.high_hz
            )));
        }
        Ok(())
    }
}

impl Default for FilterBand {
    /// 1–40 Hz, the band used for the SSVEP tutorials.
    fn default() -> Self {
        Self { low_hz: 1.0, high_hz: 40.0 }
    }
}

/// MNE transition bandwidth for a highpass edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE transition bandwidth for a lowpass edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth, always odd.
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase band-pass FIR filter.
///
/// Built as the difference of two Hamming-windowed lowpass kernels of equal
/// length, which is what `firwin` produces for a two-edge pass band.
pub fn design_bandpass(band: FilterBand, sfreq: f64) -> Result<Vec<f64>> {
    band.validate(sfreq)?;
    let l_tb = auto_trans_bandwidth(band.low_hz);
    let h_tb = auto_trans_bandwidth_high(band.high_hz, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);

    let low_cut = band.low_hz - l_tb / 2.0;
    let high_cut = band.high_hz + h_tb / 2.0;

    let upper = firwin(n, high_cut, sfreq, true);
    let lower = firwin(n, low_cut, sfreq, true);
    Ok(upper.iter().zip(lower.iter()).map(|(u, l)| u - l).collect())
}

/// Windowed-sinc FIR of odd length `n`.
///
/// `pass_zero=true` means the DC component passes (lowpass).
/// `cutoff_hz` is the -6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;
    let fc = cutoff_hz / nyq;

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
