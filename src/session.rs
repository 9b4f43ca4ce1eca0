//! Stateful analysis session.
//!
//! ```text
//! Unconfigured ──load──▶ Loaded ──build_signal──▶ SignalBuilt
//!                                                     │
//!                        Cleaned ◀──exclude── Decomposed ◀──fit_decomposition
//! ```
//!
//! Consumer operations (`get_component_maps`, `get_sources`,
//! `get_time_series`, `exclude`) drive the state forward on demand from the
//! stored [`SessionConfig`], so a session built from a config with an `input`
//! path can be queried directly. Setters invalidate whatever depends on the
//! changed field. Every operation either succeeds or leaves the session
//! exactly as it was.
use std::path::Path;

use log::{debug, info};
use ndarray::{Array1, Array2};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::exclusion;
use crate::filter::FilterBand;
use crate::ica::{FittedDecomposition, IcaEngine, IcaParams, Method};
use crate::io::{load_recording, RawRecording, RecordingSource};
use crate::montage::Montage;
use crate::signal::{build_signal, ChannelSelection, RawSignal};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Unconfigured,
    Loaded,
    SignalBuilt,
    Decomposed,
    Cleaned,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    recording: Option<RawRecording>,
    /// Montage passed to [`Session::build_signal`]; overrides the config.
    montage: Option<Montage>,
    signal: Option<RawSignal>,
    fitted: Option<FittedDecomposition>,
    /// Parameters that produced `fitted`.
    fit_params: Option<IcaParams>,
    cleaned: Option<RawSignal>,
    excluded: Vec<usize>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Unconfigured,
            recording: None,
            montage: None,
            signal: None,
            fitted: None,
            fit_params: None,
            cleaned: None,
            excluded: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn recording(&self) -> Option<&RawRecording> {
        self.recording.as_ref()
    }

    /// The uncleaned signal, once built.
    pub fn signal(&self) -> Option<&RawSignal> {
        self.signal.as_ref()
    }

    pub fn fitted(&self) -> Option<&FittedDecomposition> {
        self.fitted.as_ref()
    }

    pub fn cleaned(&self) -> Option<&RawSignal> {
        self.cleaned.as_ref()
    }

    /// Components removed by the last successful [`Session::exclude`].
    pub fn excluded(&self) -> &[usize] {
        &self.excluded
    }

    // ── Explicit transitions ─────────────────────────────────────────────

    /// Read a recording, replacing any previous one and everything derived
    /// from it.
    pub fn load(&mut self, path: impl AsRef<Path>, source: &RecordingSource) -> Result<()> {
        let path = path.as_ref();
        let recording = load_recording(path, source)?;
        self.config.input = Some(path.to_path_buf());
        self.config.source = source.clone();
        self.recording = Some(recording);
        self.clear_signal();
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Re-read the configured input from disk and drop every derived artifact.
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .config
            .input
            .clone()
            .ok_or(Error::NotConfigured("an input path"))?;
        let source = self.config.source.clone();
        info!("reloading {}", path.display());
        self.load(&path, &source)
    }

    /// Build the signal from the loaded recording (loading it first if needed).
    pub fn build_signal(
        &mut self,
        montage: &Montage,
        sfreq: f64,
        filter: Option<FilterBand>,
    ) -> Result<()> {
        self.ensure_loaded()?;
        let recording = self.recording.as_ref().ok_or(Error::NotConfigured("a recording"))?;
        let signal = build_signal(recording, montage, sfreq, filter, self.config.n_jobs)?;

        self.config.sfreq = sfreq;
        self.config.filter = filter;
        self.config.montage = montage.kind().to_string();
        self.montage = Some(montage.clone());
        self.clear_signal();
        self.signal = Some(signal);
        self.state = SessionState::SignalBuilt;
        Ok(())
    }

    /// Fit a decomposition with the given parameters; the remaining ones
    /// (decimation, rejection, iteration budget) come from the config.
    ///
    /// An identical request returns the cached fit. On failure the previous
    /// decomposition and configuration are kept.
    pub fn fit_decomposition(
        &mut self,
        picks: Option<Vec<usize>>,
        n_components: Option<usize>,
        method: Method,
        seed: u64,
    ) -> Result<&FittedDecomposition> {
        let params = IcaParams {
            picks,
            n_components,
            method,
            seed,
            ..self.config.ica_params()
        };
        self.fit_with(params)
    }

    // ── Setters ──────────────────────────────────────────────────────────

    pub fn set_picks(&mut self, picks: Option<Vec<usize>>) {
        if self.config.picks != picks {
            self.config.picks = picks;
            self.clear_fit();
        }
    }

    pub fn set_method(&mut self, method: Method) {
        if self.config.method != method {
            self.config.method = method;
            self.clear_fit();
        }
    }

    pub fn set_n_components(&mut self, n_components: Option<usize>) {
        if self.config.n_components != n_components {
            self.config.n_components = n_components;
            self.clear_fit();
        }
    }

    pub fn set_filter(&mut self, filter: Option<FilterBand>) {
        if self.config.filter != filter {
            self.config.filter = filter;
            self.clear_signal();
            if self.recording.is_some() {
                self.state = SessionState::Loaded;
            }
        }
    }

    // ── Consumer operations ──────────────────────────────────────────────

    /// Spatial maps `[n_picks, n_components]` of the current decomposition.
    pub fn get_component_maps(&mut self) -> Result<&Array2<f64>> {
        self.ensure_fitted().map(FittedDecomposition::maps)
    }

    /// Component time courses `[n_components, T]` of the uncleaned signal.
    pub fn get_sources(&mut self) -> Result<Array2<f64>> {
        self.ensure_fitted()?;
        match (&self.fitted, &self.signal) {
            (Some(fitted), Some(signal)) => fitted.sources(signal),
            _ => Err(Error::NotConfigured("a fitted decomposition")),
        }
    }

    /// Rows `picks` (all channels when `None`) of the cleaned signal if one
    /// exists, otherwise of the signal.
    pub fn get_time_series(&mut self, picks: Option<&[usize]>) -> Result<Array2<f64>> {
        let signal = self.current_signal()?;
        let selection = ChannelSelection::resolve(picks, signal.n_channels())?;
        Ok(signal.picks_data(&selection))
    }

    /// Sample times of the signal in seconds.
    pub fn times(&mut self) -> Result<Array1<f64>> {
        Ok(self.current_signal()?.times())
    }

    /// Remove components from the uncleaned signal and keep the result.
    ///
    /// Returns the full cleaned `[C, T]` matrix. Repeated calls always start
    /// from the uncleaned signal, so excluding the same set twice gives the
    /// same output.
    pub fn exclude(&mut self, indices: &[usize]) -> Result<Array2<f64>> {
        self.ensure_fitted()?;
        let cleaned = match (&self.fitted, &self.signal) {
            (Some(fitted), Some(signal)) => exclusion::apply(fitted, signal, indices)?,
            _ => return Err(Error::NotConfigured("a fitted decomposition")),
        };
        let data = cleaned.data().clone();
        self.cleaned = Some(cleaned);
        self.excluded = indices.to_vec();
        self.state = SessionState::Cleaned;
        Ok(data)
    }

    // ── Lazy forward transitions ─────────────────────────────────────────

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.recording.is_none() {
            self.reload()?;
        }
        Ok(())
    }

    fn ensure_signal(&mut self) -> Result<()> {
        if self.signal.is_some() {
            return Ok(());
        }
        let montage = match &self.montage {
            Some(m) => m.clone(),
            None => match &self.config.montage_path {
                Some(path) => Montage::from_path(path)?,
                None => Montage::builtin(&self.config.montage)?,
            },
        };
        let (sfreq, filter) = (self.config.sfreq, self.config.filter);
        self.build_signal(&montage, sfreq, filter)
    }

    fn ensure_fitted(&mut self) -> Result<&FittedDecomposition> {
        let params = self.config.ica_params();
        self.fit_with(params)
    }

    fn current_signal(&mut self) -> Result<&RawSignal> {
        self.ensure_signal()?;
        self.cleaned
            .as_ref()
            .or(self.signal.as_ref())
            .ok_or(Error::NotConfigured("a signal"))
    }

    fn fit_with(&mut self, params: IcaParams) -> Result<&FittedDecomposition> {
        self.ensure_signal()?;
        let cached = self.fitted.is_some() && self.fit_params.as_ref() == Some(&params);
        if cached {
            debug!("reusing cached decomposition");
        } else {
            let signal = self.signal.as_ref().ok_or(Error::NotConfigured("a signal"))?;
            let fitted = IcaEngine::new().fit(signal, &params)?;

            self.config.picks = params.picks.clone();
            self.config.n_components = params.n_components;
            self.config.method = params.method;
            self.config.seed = params.seed;
            self.fitted = Some(fitted);
            self.fit_params = Some(params);
            self.cleaned = None;
            self.excluded.clear();
            self.state = SessionState::Decomposed;
        }
        self.fitted.as_ref().ok_or(Error::NotConfigured("a fitted decomposition"))
    }

    fn clear_fit(&mut self) {
        self.fitted = None;
        self.fit_params = None;
        self.cleaned = None;
        self.excluded.clear();
        if self.signal.is_some() {
            self.state = SessionState::SignalBuilt;
        }
    }

    fn clear_signal(&mut self) {
        self.signal = None;
        self.clear_fit();
    }
}
