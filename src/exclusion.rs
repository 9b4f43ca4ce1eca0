//! Component exclusion: reconstruct a signal without selected components.
//!
//! Mirrors `mne.preprocessing.ICA.apply` / `_pick_sources`:
//!
//! ```text
//! x  = picks / pre_whitener − mean           [P, T]
//! y  = pca_components · x                    all P principal axes
//! s  = unmixing · y[..K];  s[excluded] = 0
//! y[..K] = mixing · s                        y[K..] (PCA residual) untouched
//! x' = (pca_componentsᵀ · y + mean) · pre_whitener
//! ```
//!
//! Unpicked channels are copied through unchanged.
use log::info;
use ndarray::s;

use crate::error::{Error, Result};
use crate::ica::FittedDecomposition;
use crate::signal::RawSignal;

/// Reconstruct `signal` with the components in `exclude` removed.
///
/// Indices are validated before any work is done; duplicates are allowed and
/// act once. `exclude = []` reproduces the input up to floating-point error.
pub fn apply(fitted: &FittedDecomposition, signal: &RawSignal, exclude: &[usize]) -> Result<RawSignal> {
    let n_components = fitted.n_components();
    if let Some(&index) = exclude.iter().find(|&&i| i >= n_components) {
        return Err(Error::InvalidComponentIndex { index, n_components });
    }

    let mut y = fitted.to_pca_space(signal)?;
    let mut sources = fitted.unmixing().dot(&y.slice(s![..n_components, ..]));
    for &k in exclude {
        sources.row_mut(k).fill(0.0);
    }
    y.slice_mut(s![..n_components, ..]).assign(&fitted.mixing().dot(&sources));
    let cleaned = fitted.from_pca_space(&y);

    let mut data = signal.data().clone();
    for (row, &ch) in cleaned.rows().into_iter().zip(fitted.picks()) {
        data.row_mut(ch).assign(&row);
    }

    let mut excluded: Vec<usize> = exclude.to_vec();
    excluded.sort_unstable();
    excluded.dedup();
    info!(
        "removed {} of {n_components} components {excluded:?} from {} channels",
        excluded.len(),
        fitted.picks().len()
    );
    Ok(signal.with_data(data))
}
