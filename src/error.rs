//! Error taxonomy.
//!
//! Every variant is terminal for the operation that produced it: they describe
//! caller or input mistakes, never transient conditions, so nothing in the
//! crate retries on them.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported file format {extension:?} for {path}; accepted: mat, txt, csv, tsv")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("variable {name:?} not found in {path}")]
    MissingVariable { path: PathBuf, name: String },

    #[error("parse error in {path} (line {line}): {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("montage has {expected} EEG channels but the recording has {found} rows")]
    MontageMismatch { expected: usize, found: usize },

    #[error("unknown montage {0:?}")]
    UnknownMontage(String),

    #[error("electrode {0:?} not found in the electrode table")]
    UnknownElectrode(String),

    #[error("unsupported ICA method {0:?}; expected one of: fastica, infomax, extended-infomax")]
    UnsupportedMethod(String),

    #[error("n_components = {requested} is outside [1, {n_picks}]")]
    InvalidComponentCount { requested: usize, n_picks: usize },

    #[error("component index {index} is outside [0, {n_components})")]
    InvalidComponentIndex { index: usize, n_components: usize },

    #[error("invalid channel selection: {0}")]
    InvalidPicks(String),

    #[error("invalid filter band: {0}")]
    InvalidFilter(String),

    #[error("sampling rate must be a positive finite number, got {0}")]
    InvalidSamplingRate(f64),

    #[error("no clean segment found; consider relaxing the rejection thresholds")]
    NoCleanSegments,

    #[error("session is missing {0}")]
    NotConfigured(&'static str),

    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
