//! Session configuration.
//!
//! [`SessionConfig`] holds every tunable parameter of a [`crate::Session`].
//! All fields have defaults matching the reference BioSemi-128 analysis
//! (256 Hz, 1–40 Hz band-pass, FastICA with seed 23 and decimation 3).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filter::FilterBand;
use crate::ica::{IcaParams, Method, Rejection, DEFAULT_DECIM, DEFAULT_SEED};
use crate::io::RecordingSource;

/// Configuration for one analysis session.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use bieg::SessionConfig;
///
/// let cfg = SessionConfig {
///     n_components: Some(20),   // fit 20 components instead of one per pick
///     filter: None,             // decompose the unfiltered recording
///     ..SessionConfig::default()
/// };
/// ```
///
/// It also deserialises from JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recording to load (`.mat`, `.txt`, `.csv` or `.tsv`).
    ///
    /// Default: `None`; a session without input cannot leave `Unconfigured`.
    pub input: Option<PathBuf>,

    /// MATLAB variable name or text field separator.
    ///
    /// Default: variable `"EEGdata"`, separator tab.
    pub source: RecordingSource,

    /// Built-in montage name, see [`crate::Montage::builtin`].
    ///
    /// Ignored when [`SessionConfig::montage_path`] is set.
    ///
    /// Default: `"biosemi128"`.
    pub montage: String,

    /// MNE-style text montage to use instead of a built-in one.
    ///
    /// Default: `None`.
    pub montage_path: Option<PathBuf>,

    /// Sampling rate of the recording in Hz.
    ///
    /// Default: `256.0`.
    pub sfreq: f64,

    /// Zero-phase FIR band-pass applied when the signal is built.
    ///
    /// `None` keeps the raw data. At the default 1–40 Hz / 256 Hz the kernel
    /// has 845 taps.
    ///
    /// Default: `Some(1.0–40.0 Hz)`.
    pub filter: Option<FilterBand>,

    /// Worker threads for filtering. Output does not depend on it.
    ///
    /// Default: `2`.
    pub n_jobs: usize,

    /// Channel indices to decompose. `None` means every channel.
    ///
    /// Default: `None`.
    pub picks: Option<Vec<usize>>,

    /// Number of ICA components, `1..=picks.len()`.
    ///
    /// Default: `None` (one per pick).
    pub n_components: Option<usize>,

    /// Decomposition algorithm.
    ///
    /// Default: [`Method::FastIca`].
    pub method: Method,

    /// RNG seed of the decomposition.
    ///
    /// Default: `23`.
    pub seed: u64,

    /// Fit on every `decim`-th sample.
    ///
    /// Default: `3`.
    pub decim: usize,

    /// Peak-to-peak thresholds for segment rejection before fitting.
    ///
    /// Default: `None` (fit on all samples).
    pub reject: Option<Rejection>,

    /// Iteration budget of the decomposer.
    ///
    /// Default: `200`.
    pub max_iter: usize,

    /// FastICA convergence tolerance.
    ///
    /// Default: `1e-4`.
    pub tol: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input: None,
            source: RecordingSource::default(),
            montage: "biosemi128".to_string(),
            montage_path: None,
            sfreq: 256.0,
            filter: Some(FilterBand::default()),
            n_jobs: 2,
            picks: None,
            n_components: None,
            method: Method::FastIca,
            seed: DEFAULT_SEED,
            decim: DEFAULT_DECIM,
            reject: None,
            max_iter: 200,
            tol: 1e-4,
        }
    }
}

impl SessionConfig {
    /// Fit parameters derived from this configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use bieg::SessionConfig;
    /// let params = SessionConfig::default().ica_params();
    /// assert_eq!(params.seed, 23);
    /// assert_eq!(params.decim, 3);
    /// ```
    pub fn ica_params(&self) -> IcaParams {
        IcaParams {
            picks: self.picks.clone(),
            n_components: self.n_components,
            method: self.method,
            seed: self.seed,
            decim: self.decim,
            reject: self.reject.clone(),
            max_iter: self.max_iter,
            tol: self.tol,
        }
    }
}
