//! # bieg: blind source separation of EEG with ICA, in pure Rust
//!
//! `bieg` loads a multichannel EEG recording, band-pass filters it, fits an
//! independent component analysis and reconstructs the signal with chosen
//! components removed. Filter design, layout projection and the ICA
//! algorithms follow [MNE-Python](https://mne.tools) conventions.
//!
//! _No Python, no BLAS, no C libraries: pure Rust + [ndarray](https://crates.io/crates/ndarray),
//! [RustFFT](https://crates.io/crates/rustfft) and [linfa-ica](https://crates.io/crates/linfa-ica)._
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.mat / .txt
//!   │
//!   ├─ io::load_recording()      MATLAB v5 variable or delimited text → [C, T]
//!   ├─ signal::build_signal()    montage → 2-D layout (K − 3 channels)
//!   │    └─ filter (FIR BP)      zero-phase, 1–40 Hz by default
//!   ├─ ica::IcaEngine::fit()     picks → decimate → reject → PCA → unmix
//!   │    └─ FittedDecomposition  maps [P, K], sources [K, T]
//!   └─ exclusion::apply()        zero chosen components, reconstruct
//!        │
//!        └─→ cleaned [C, T]
//! ```
//!
//! [`Session`] strings these together as a state machine driven by a
//! [`SessionConfig`], fitting lazily and caching the decomposition.
//!
//! ## Quick start
//!
//! ```no_run
//! use bieg::{resolve_biosemi_indices, Session, SessionConfig};
//!
//! let picks = resolve_biosemi_indices(&["A10", "A15", "A21", "A23", "A28", "B7", "C17"])?;
//! let cfg = SessionConfig {
//!     input: Some("data/ssvep.mat".into()),
//!     picks: Some(picks),
//!     ..SessionConfig::default()
//! };
//!
//! let mut session = Session::new(cfg);
//! let maps = session.get_component_maps()?.clone();   // [7, 7]
//! let cleaned = session.exclude(&[0, 6])?;            // [128, T]
//! # Ok::<(), bieg::Error>(())
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use bieg::{build_signal, exclusion, load_recording, FilterBand, IcaEngine, IcaParams,
//!            Montage, RecordingSource};
//!
//! let rec = load_recording("data/ssvep.txt", &RecordingSource::default())?;
//! let montage = Montage::builtin("biosemi128")?;
//! let signal = build_signal(&rec, &montage, 256.0, Some(FilterBand::new(1.0, 40.0)), 2)?;
//!
//! let fitted = IcaEngine::new().fit(&signal, &IcaParams::default())?;
//! let cleaned = exclusion::apply(&fitted, &signal, &[0])?;
//! # Ok::<(), bieg::Error>(())
//! ```

pub mod config;
pub mod electrodes;
pub mod error;
pub mod exclusion;
pub mod filter;
pub mod ica;
pub mod io;
pub mod layout;
pub mod montage;
pub mod normalize;
pub mod session;
pub mod signal;

use ndarray::Array2;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `bieg::Foo` without having to know the internal module layout.

// config
pub use config::SessionConfig;

// electrodes
pub use electrodes::{resolve_biosemi_indices, ElectrodeTable};

// error
pub use error::{Error, Result};

// filter: design helpers + convolution
pub use filter::{apply_fir_zero_phase, design_bandpass, FilterBand};

// ica: engine, decomposers, fitted model
pub use ica::{
    Decomposer, FastIca, FittedDecomposition, IcaEngine, IcaParams, Infomax, Method, Rejection,
    Unmixing,
};

// io: loaders + safetensors export
pub use io::{
    load_recording, read_f64_tensors, write_components, write_time_series, RawRecording,
    RecordingSource, StWriter,
};

// layout / montage / signal
pub use layout::ChannelLayout;
pub use montage::Montage;
pub use session::{Session, SessionState};
pub use signal::{build_signal, ChannelSelection, ChannelType, RawSignal};

/// Run the **whole pipeline** once: load, build, fit, exclude.
///
/// Equivalent to driving a [`Session`] by hand; returns the cleaned `[C, T]`
/// matrix. `exclude = []` returns the (filtered) signal itself.
///
/// # Errors
///
/// Any error of the individual steps, e.g. [`Error::NotConfigured`] when
/// `cfg.input` is `None` or [`Error::InvalidComponentIndex`] for a bad
/// exclusion index.
pub fn decompose_and_clean(cfg: &SessionConfig, exclude: &[usize]) -> Result<Array2<f64>> {
    let mut session = Session::new(cfg.clone());
    session.exclude(exclude)
}
