//! Raw signal construction: recording + montage layout + optional band-pass.
//!
//! ```text
//! RawRecording [C, T]
//!   │
//!   ├─ Montage (K entries) ─→ ChannelLayout (K − 3 channels, 2-D)
//!   │                          └─ C must equal K − 3
//!   └─ optional FilterBand  ─→ zero-phase FIR band-pass, in place
//!        │
//!        └─→ RawSignal
//! ```
use log::info;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::{apply_fir_zero_phase, design_bandpass, FilterBand};
use crate::io::RawRecording;
use crate::layout::ChannelLayout;
use crate::montage::Montage;

/// Sensor type of a channel. Recordings built here are all EEG; the other
/// kinds exist so rejection thresholds can be keyed by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Eeg,
    Eog,
    Mag,
    Grad,
}

/// Validated, ordered, duplicate-free channel indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection(Vec<usize>);

impl ChannelSelection {
    /// Every channel, `0..n_channels`.
    pub fn all(n_channels: usize) -> Self {
        Self((0..n_channels).collect())
    }

    /// Validate `indices` against `n_channels`.
    pub fn new(indices: &[usize], n_channels: usize) -> Result<Self> {
        if indices.is_empty() {
            return Err(Error::InvalidPicks("selection is empty".into()));
        }
        let mut seen = vec![false; n_channels];
        for &i in indices {
            if i >= n_channels {
                return Err(Error::InvalidPicks(format!(
                    "channel index {i} is outside [0, {n_channels})"
                )));
            }
            if seen[i] {
                return Err(Error::InvalidPicks(format!("channel index {i} picked twice")));
            }
            seen[i] = true;
        }
        Ok(Self(indices.to_vec()))
    }

    /// `None` means all channels.
    pub fn resolve(indices: Option<&[usize]>, n_channels: usize) -> Result<Self> {
        match indices {
            Some(idx) => Self::new(idx, n_channels),
            None => Ok(Self::all(n_channels)),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `[C, T]` data with its layout and the band-pass applied so far.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    data: Array2<f64>,
    layout: ChannelLayout,
    filter: Option<FilterBand>,
}

impl RawSignal {
    /// Pair data with a layout; row count must match the layout.
    pub fn new(data: Array2<f64>, layout: ChannelLayout) -> Result<Self> {
        if data.nrows() != layout.len() {
            return Err(Error::MontageMismatch {
                expected: layout.len(),
                found: data.nrows(),
            });
        }
        Ok(Self { data, layout, filter: None })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn ch_names(&self) -> &[String] {
        self.layout.names()
    }

    pub fn ch_types(&self) -> Vec<ChannelType> {
        vec![ChannelType::Eeg; self.n_channels()]
    }

    pub fn sfreq(&self) -> f64 {
        self.layout.sfreq()
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Band applied by [`RawSignal::filter`], if any.
    pub fn filter_band(&self) -> Option<FilterBand> {
        self.filter
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// Sample times in seconds, `t / sfreq`.
    pub fn times(&self) -> Array1<f64> {
        let sfreq = self.sfreq();
        Array1::from_shape_fn(self.n_times(), |t| t as f64 / sfreq)
    }

    /// Rows `picks` as an owned `[P, T]` array.
    pub fn picks_data(&self, picks: &ChannelSelection) -> Array2<f64> {
        self.data.select(Axis(0), picks.indices())
    }

    /// Band-pass every channel in place on up to `n_jobs` threads.
    pub fn filter(&mut self, band: FilterBand, n_jobs: usize) -> Result<()> {
        let h = design_bandpass(band, self.sfreq())?;
        apply_fir_zero_phase(&mut self.data, &h, n_jobs)?;
        info!(
            "band-pass {}–{} Hz applied ({} taps)",
            band.low_hz,
            band.high_hz,
            h.len()
        );
        self.filter = Some(band);
        Ok(())
    }

    /// Same layout and filter state, different data of the same shape.
    pub(crate) fn with_data(&self, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        Self {
            data,
            layout: self.layout.clone(),
            filter: self.filter,
        }
    }
}

/// Build a [`RawSignal`] from a recording and a montage.
///
/// `filter = None` leaves the data untouched; `Some(band)` band-passes it in
/// place. Fails with [`Error::MontageMismatch`] if the recording's row count
/// differs from the montage's `K - 3` channels, and with
/// [`Error::InvalidSamplingRate`] unless `sfreq` is positive and finite.
pub fn build_signal(
    recording: &RawRecording,
    montage: &Montage,
    sfreq: f64,
    filter: Option<FilterBand>,
    n_jobs: usize,
) -> Result<RawSignal> {
    if !(sfreq.is_finite() && sfreq > 0.0) {
        return Err(Error::InvalidSamplingRate(sfreq));
    }
    if montage.n_eeg() != recording.n_channels() {
        return Err(Error::MontageMismatch {
            expected: montage.n_eeg(),
            found: recording.n_channels(),
        });
    }
    if let Some(band) = filter {
        // Fail before copying the data.
        band.validate(sfreq)?;
    }

    let layout = ChannelLayout::from_montage(montage, sfreq);
    let mut signal = RawSignal::new(recording.data.clone(), layout)?;
    info!(
        "signal built: {} ch × {} samples @ {sfreq} Hz ({} montage)",
        signal.n_channels(),
        signal.n_times(),
        montage.kind()
    );

    if let Some(band) = filter {
        signal.filter(band, n_jobs)?;
    }
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_rejects_duplicates_and_out_of_range() {
        assert!(ChannelSelection::new(&[0, 2, 1], 3).is_ok());
        assert!(matches!(ChannelSelection::new(&[0, 0], 3), Err(Error::InvalidPicks(_))));
        assert!(matches!(ChannelSelection::new(&[3], 3), Err(Error::InvalidPicks(_))));
        assert!(matches!(ChannelSelection::new(&[], 3), Err(Error::InvalidPicks(_))));
        assert_eq!(ChannelSelection::resolve(None, 4).unwrap().indices(), &[0, 1, 2, 3]);
    }
}
