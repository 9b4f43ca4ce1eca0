//! Independent component analysis of a [`RawSignal`].
//!
//! The fitting pipeline follows `mne.preprocessing.ICA.fit`:
//!
//! ```text
//! RawSignal [C, T]
//!   │
//!   ├─ picks                 rows of the selected channels      → [P, T]
//!   ├─ decimate              data[:, ::decim]                   → [P, N]
//!   ├─ reject (optional)     drop 2 s segments over threshold   → [P, N']
//!   ├─ pre-whiten            ÷ std of each channel type
//!   ├─ PCA                   centre, eigh(cov), sign-fixed basis
//!   ├─ whiten                first K PCA scores ÷ √eigenvalue    → [K, N']
//!   ├─ Decomposer::unmix     FastICA / Infomax / custom          → W [K, K]
//!   └─ unmixing = W·diag(1/√λ), mixing = unmixing⁻¹
//!        │
//!        └─→ FittedDecomposition (components sorted by explained variance,
//!            every spatial map's largest-magnitude loading positive)
//! ```
//!
//! The whole pipeline is deterministic: the decomposer draws from a
//! `StdRng` seeded with [`IcaParams::seed`], and the linear algebra in
//! [`linalg`] has no data-dependent parallelism.
//!
//! ## Example
//!
//! ```no_run
//! use bieg::ica::{IcaEngine, IcaParams, Method};
//! # fn demo(signal: &bieg::RawSignal) -> bieg::Result<()> {
//! let params = IcaParams {
//!     n_components: Some(20),
//!     method: Method::ExtendedInfomax,
//!     ..IcaParams::default()
//! };
//! let fitted = IcaEngine::new().fit(signal, &params)?;
//! let sources = fitted.sources(signal)?;   // [20, T]
//! # Ok(()) }
//! ```
pub mod fastica;
pub mod infomax;
pub mod linalg;
pub mod reject;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalize::{center_rows_inplace, global_std};
use crate::signal::{ChannelSelection, ChannelType, RawSignal};

pub use fastica::FastIca;
pub use infomax::Infomax;
pub use reject::{reject_segments, Rejection};

/// Default RNG seed (`random_state=23`).
pub const DEFAULT_SEED: u64 = 23;
/// Default decimation stride.
pub const DEFAULT_DECIM: usize = 3;

// ── Decomposer seam ──────────────────────────────────────────────────────────

/// Result of one unmixing run in whitened space.
#[derive(Debug, Clone)]
pub struct Unmixing {
    /// `[K, K]`, maps whitened data to sources.
    pub matrix: Array2<f64>,
    /// `None` when the backend does not report iteration counts.
    pub n_iter: Option<usize>,
    pub converged: Option<bool>,
}

/// An ICA algorithm operating on whitened, centred data.
///
/// `white` is `[K, N]` with identity covariance; implementations return the
/// `[K, K]` matrix `W` such that `W · white` are the estimated sources. All
/// randomness must come from `rng`.
pub trait Decomposer {
    fn name(&self) -> &str;
    fn unmix(&self, white: ArrayView2<f64>, rng: &mut StdRng) -> Result<Unmixing>;
}

/// Built-in decomposition methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Method {
    #[default]
    #[serde(rename = "fastica")]
    FastIca,
    #[serde(rename = "infomax")]
    Infomax,
    #[serde(rename = "extended-infomax")]
    ExtendedInfomax,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::FastIca => "fastica",
            Method::Infomax => "infomax",
            Method::ExtendedInfomax => "extended-infomax",
        }
    }

    /// Instantiate the algorithm with the given iteration budget.
    ///
    /// `tol` is FastICA's convergence tolerance; Infomax keeps its own
    /// weight-change criterion.
    pub fn decomposer(&self, max_iter: usize, tol: f64) -> Box<dyn Decomposer> {
        match self {
            Method::FastIca => Box::new(FastIca { max_iter, tol }),
            Method::Infomax => Box::new(Infomax { max_iter, ..Infomax::new(false) }),
            Method::ExtendedInfomax => Box::new(Infomax { max_iter, ..Infomax::new(true) }),
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fastica" => Ok(Method::FastIca),
            "infomax" => Ok(Method::Infomax),
            "extended-infomax" => Ok(Method::ExtendedInfomax),
            other => Err(Error::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parameters ───────────────────────────────────────────────────────────────

/// Everything that determines a fit. Two equal `IcaParams` on the same signal
/// produce bit-identical decompositions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcaParams {
    /// Channel indices to decompose; `None` means every channel.
    pub picks: Option<Vec<usize>>,
    /// Defaults to the number of picks.
    pub n_components: Option<usize>,
    pub method: Method,
    pub seed: u64,
    pub decim: usize,
    pub reject: Option<Rejection>,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for IcaParams {
    fn default() -> Self {
        Self {
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

// ── Fitted model ─────────────────────────────────────────────────────────────

/// A fitted decomposition, immutable once built.
#[derive(Debug, Clone)]
pub struct FittedDecomposition {
    method: String,
    seed: u64,
    decim: usize,
    picks: Vec<usize>,
    /// Per-pick scale removed before PCA.
    pre_whitener: Array1<f64>,
    pca_mean: Array1<f64>,
    /// `[P, P]`, rows are principal axes sorted by variance.
    pca_components: Array2<f64>,
    pca_explained_variance: Array1<f64>,
    unmixing: Array2<f64>,
    mixing: Array2<f64>,
    maps: Array2<f64>,
    explained_variance: Array1<f64>,
    n_fit_samples: usize,
    n_iter: Option<usize>,
    converged: Option<bool>,
    dropped_segments: Vec<(usize, usize)>,
}

impl FittedDecomposition {
    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn decim(&self) -> usize {
        self.decim
    }

    /// Channel indices the decomposition was fitted on.
    pub fn picks(&self) -> &[usize] {
        &self.picks
    }

    /// Spatial map of every component, `[n_picks, n_components]`, in the
    /// units of the signal.
    pub fn maps(&self) -> &Array2<f64> {
        &self.maps
    }

    /// `[K, K]`, PCA scores → sources.
    pub fn unmixing(&self) -> &Array2<f64> {
        &self.unmixing
    }

    /// `[K, K]`, sources → PCA scores; inverse of [`Self::unmixing`].
    pub fn mixing(&self) -> &Array2<f64> {
        &self.mixing
    }

    pub fn pca_components(&self) -> &Array2<f64> {
        &self.pca_components
    }

    pub fn pca_mean(&self) -> &Array1<f64> {
        &self.pca_mean
    }

    /// Variance of each principal axis (descending).
    pub fn pca_explained_variance(&self) -> &Array1<f64> {
        &self.pca_explained_variance
    }

    pub fn pre_whitener(&self) -> &Array1<f64> {
        &self.pre_whitener
    }

    /// Fraction of the (pre-whitened) data variance carried by each component.
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Samples the decomposition was fitted on, after decimation and rejection.
    pub fn n_fit_samples(&self) -> usize {
        self.n_fit_samples
    }

    pub fn n_iter(&self) -> Option<usize> {
        self.n_iter
    }

    pub fn converged(&self) -> Option<bool> {
        self.converged
    }

    /// Decimated-sample ranges excluded by rejection.
    pub fn dropped_segments(&self) -> &[(usize, usize)] {
        &self.dropped_segments
    }

    /// Component time courses over the whole signal, `[K, T]`.
    pub fn sources(&self, signal: &RawSignal) -> Result<Array2<f64>> {
        let y = self.to_pca_space(signal)?;
        Ok(self.unmixing.dot(&y.slice(s![..self.n_components(), ..])))
    }

    /// Picked channels of `signal`, pre-whitened, centred and rotated onto
    /// the principal axes: `[P, T]`.
    pub(crate) fn to_pca_space(&self, signal: &RawSignal) -> Result<Array2<f64>> {
        let picks = ChannelSelection::new(&self.picks, signal.n_channels())?;
        let mut x = signal.picks_data(&picks);
        for ((mut row, &pw), &m) in x
            .rows_mut()
            .into_iter()
            .zip(self.pre_whitener.iter())
            .zip(self.pca_mean.iter())
        {
            row.mapv_inplace(|v| v / pw - m);
        }
        Ok(self.pca_components.dot(&x))
    }

    /// Inverse of [`Self::to_pca_space`].
    pub(crate) fn from_pca_space(&self, y: &Array2<f64>) -> Array2<f64> {
        let mut x = self.pca_components.t().dot(y);
        for ((mut row, &pw), &m) in x
            .rows_mut()
            .into_iter()
            .zip(self.pre_whitener.iter())
            .zip(self.pca_mean.iter())
        {
            row.mapv_inplace(|v| (v + m) * pw);
        }
        x
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Fits [`FittedDecomposition`]s.
///
/// By default the algorithm comes from [`IcaParams::method`];
/// [`IcaEngine::with_decomposer`] plugs in any other [`Decomposer`].
#[derive(Default)]
pub struct IcaEngine {
    custom: Option<Box<dyn Decomposer>>,
}

impl IcaEngine {
    pub fn new() -> Self {
        Self { custom: None }
    }

    pub fn with_decomposer(decomposer: impl Decomposer + 'static) -> Self {
        Self { custom: Some(Box::new(decomposer)) }
    }

    /// Fit a decomposition of `signal`.
    pub fn fit(&self, signal: &RawSignal, params: &IcaParams) -> Result<FittedDecomposition> {
        let picks = ChannelSelection::resolve(params.picks.as_deref(), signal.n_channels())?;
        let n_picks = picks.len();
        let n_components = params.n_components.unwrap_or(n_picks);
        if n_components == 0 || n_components > n_picks {
            return Err(Error::InvalidComponentCount { requested: n_components, n_picks });
        }
        let decim = params.decim.max(1);

        let owned;
        let decomposer: &dyn Decomposer = match &self.custom {
            Some(d) => d.as_ref(),
            None => {
                owned = params.method.decomposer(params.max_iter, params.tol);
                owned.as_ref()
            }
        };

        // ── Fit data ─────────────────────────────────────────────────────
        let all_types = signal.ch_types();
        let ch_types: Vec<ChannelType> = picks.indices().iter().map(|&i| all_types[i]).collect();
        let picked = signal.picks_data(&picks);
        let decimated = picked.slice(s![.., ..;decim]);
        let (mut x, dropped_segments) = match &params.reject {
            Some(rejection) => {
                reject_segments(decimated, &ch_types, rejection, signal.sfreq(), decim)?
            }
            None => (decimated.to_owned(), Vec::new()),
        };
        let n_samples = x.ncols();
        if n_samples <= n_components {
            return Err(Error::Decomposition(format!(
                "{n_samples} samples are not enough to fit {n_components} components"
            )));
        }
        info!(
            "fitting {} with {n_components} components on {n_picks} channels, {n_samples} samples (decim {decim})",
            decomposer.name()
        );

        let pre_whitener = pre_whitener(&x, &ch_types);
        for (mut row, &pw) in x.rows_mut().into_iter().zip(pre_whitener.iter()) {
            row.mapv_inplace(|v| v / pw);
        }

        // ── PCA ──────────────────────────────────────────────────────────
        let pca_mean = center_rows_inplace(&mut x);
        let cov = x.dot(&x.t()) / (n_samples - 1) as f64;
        let (pca_var, eigvecs) = linalg::symmetric_eigen(&cov)?;
        let pca_components = eigvecs.t().to_owned();
        let total_var = pca_var.sum();
        let smallest = pca_var[n_components - 1];
        if !(smallest > pca_var[0] * 1e-12) {
            return Err(Error::Decomposition(format!(
                "data rank is below n_components = {n_components} (eigenvalue {smallest:.3e})"
            )));
        }
        debug!("PCA: {n_components} of {n_picks} axes kept, top variance {:.3e}", pca_var[0]);

        let ev = pca_var.slice(s![..n_components]).to_owned();
        let inv_sqrt = ev.mapv(|l| 1.0 / l.sqrt());
        let mut white = pca_components.slice(s![..n_components, ..]).dot(&x);
        for (mut row, &f) in white.rows_mut().into_iter().zip(inv_sqrt.iter()) {
            row.mapv_inplace(|v| v * f);
        }

        // ── Unmix ────────────────────────────────────────────────────────
        let mut rng = StdRng::seed_from_u64(params.seed);
        let result = decomposer.unmix(white.view(), &mut rng)?;
        if result.matrix.dim() != (n_components, n_components) {
            return Err(Error::Decomposition(format!(
                "{} returned a {:?} matrix, expected {n_components}×{n_components}",
                decomposer.name(),
                result.matrix.dim()
            )));
        }
        let unmixing = &result.matrix * &inv_sqrt.view().insert_axis(Axis(0));
        let mixing = linalg::inverse(&unmixing)?;

        // ── Order by explained variance ──────────────────────────────────
        let sources = result.matrix.dot(&white);
        let variances: Vec<f64> = (0..n_components)
            .map(|k| {
                let s_var = sources.row(k).dot(&sources.row(k)) / (n_samples - 1) as f64;
                let a = mixing.column(k);
                s_var * a.dot(&a)
            })
            .collect();
        let mut order: Vec<usize> = (0..n_components).collect();
        order.sort_by(|&i, &j| variances[j].total_cmp(&variances[i]).then(i.cmp(&j)));

        let mut unmixing = unmixing.select(Axis(0), &order);
        let mut mixing = mixing.select(Axis(1), &order);
        let explained_variance =
            Array1::from_iter(order.iter().map(|&k| variances[k] / total_var));

        // ── Maps, sign-normalised ────────────────────────────────────────
        let mut maps = pca_components.slice(s![..n_components, ..]).t().dot(&mixing);
        for (mut row, &pw) in maps.rows_mut().into_iter().zip(pre_whitener.iter()) {
            row.mapv_inplace(|v| v * pw);
        }
        for k in 0..n_components {
            let pivot = maps
                .column(k)
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                maps.column_mut(k).mapv_inplace(|v| -v);
                mixing.column_mut(k).mapv_inplace(|v| -v);
                unmixing.row_mut(k).mapv_inplace(|v| -v);
            }
        }

        match (result.n_iter, result.converged) {
            (Some(n), Some(false)) => info!("{} stopped after {n} iterations (not converged)", decomposer.name()),
            (Some(n), _) => info!("{} fitted in {n} iterations", decomposer.name()),
            _ => info!("{} fitted", decomposer.name()),
        }

        Ok(FittedDecomposition {
            method: decomposer.name().to_string(),
            seed: params.seed,
            decim,
            picks: picks.indices().to_vec(),
            pre_whitener,
            pca_mean,
            pca_components,
            pca_explained_variance: pca_var,
            unmixing,
            mixing,
            maps,
            explained_variance,
            n_fit_samples: n_samples,
            n_iter: result.n_iter,
            converged: result.converged,
            dropped_segments,
        })
    }
}

/// Standard deviation of all picked channels of each type, broadcast back to
/// one value per channel. Flat types get a scale of 1.
fn pre_whitener(x: &Array2<f64>, ch_types: &[ChannelType]) -> Array1<f64> {
    let mut by_type: BTreeMap<ChannelType, Vec<usize>> = BTreeMap::new();
    for (i, &t) in ch_types.iter().enumerate() {
        by_type.entry(t).or_default().push(i);
    }
    let mut out = Array1::ones(ch_types.len());
    for (t, rows) in by_type {
        let std = global_std(&x.select(Axis(0), &rows));
        let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        debug!("pre-whitener {t:?}: {std:.3e} over {} channels", rows.len());
        for i in rows {
            out[i] = std;
        }
    }
    out
}
