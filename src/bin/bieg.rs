use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;

use bieg::io::{write_components, write_time_series};
use bieg::{ElectrodeTable, FilterBand, Method, Session, SessionConfig};

#[derive(Parser)]
#[command(name = "bieg", about = "ICA blind source separation for EEG recordings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit ICA and write component maps with the sensor layout
    Components {
        #[command(flatten)]
        common: Common,
        /// components.safetensors output path
        #[arg(long)]
        output: PathBuf,
    },
    /// Fit ICA and write component time courses
    Sources {
        #[command(flatten)]
        common: Common,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the (filtered) time series of the picked channels
    Timecourse {
        #[command(flatten)]
        common: Common,
        #[arg(long)]
        output: PathBuf,
    },
    /// Fit ICA, remove components and write the cleaned recording
    Exclude {
        #[command(flatten)]
        common: Common,
        /// Component indices to remove (comma-separated, e.g. 0,6)
        #[arg(long, value_delimiter = ',', required = true)]
        exclude: Vec<usize>,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct Common {
    /// JSON session config; the flags below override its fields
    #[arg(long)]
    config: Option<String>,

    /// Recording (.mat, .txt, .csv, .tsv); a leading ~ or $HOME is expanded
    #[arg(long)]
    input: Option<String>,

    /// Variable name inside a .mat archive (default: EEGdata)
    #[arg(long)]
    variable: Option<String>,

    /// Field separator of a text recording (default: tab)
    #[arg(long)]
    separator: Option<char>,

    /// Built-in montage (default: biosemi128)
    #[arg(long)]
    montage: Option<String>,

    /// MNE-style text montage instead of a built-in one
    #[arg(long)]
    montage_path: Option<String>,

    /// Sampling rate in Hz (default: 256)
    #[arg(long)]
    sfreq: Option<f64>,

    /// Band-pass low edge in Hz (default: 1)
    #[arg(long)]
    l_freq: Option<f64>,

    /// Band-pass high edge in Hz (default: 40)
    #[arg(long)]
    h_freq: Option<f64>,

    /// Skip band-pass filtering
    #[arg(long)]
    no_filter: bool,

    /// Filter worker threads (default: 2)
    #[arg(long)]
    n_jobs: Option<usize>,

    /// Electrode names to decompose (comma-separated, e.g. A10,A15,B7)
    #[arg(long, value_delimiter = ',')]
    picks: Vec<String>,

    /// Electrode table overriding the built-in BioSemi 128 names
    #[arg(long)]
    electrodes: Option<String>,

    /// Number of ICA components (default: one per pick)
    #[arg(long)]
    n_components: Option<usize>,

    /// fastica | infomax | extended-infomax (default: fastica)
    #[arg(long)]
    method: Option<String>,

    /// RNG seed (default: 23)
    #[arg(long)]
    seed: Option<u64>,

    /// Decimation stride for fitting (default: 3)
    #[arg(long)]
    decim: Option<usize>,
}

/// Expand a leading `~` or `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var("HOME").ok();
    for prefix in ["~", "$HOME"] {
        if let (Some(rest), Some(home)) = (path.strip_prefix(prefix), home.as_deref()) {
            if rest.is_empty() || rest.starts_with('/') {
                return PathBuf::from(format!("{home}{rest}"));
            }
        }
    }
    PathBuf::from(path)
}

impl Common {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let path = expand_home(path);
                let file = File::open(&path)
                    .with_context(|| format!("opening config {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => SessionConfig::default(),
        };

        if let Some(input) = &self.input {
            cfg.input = Some(expand_home(input));
        }
        if let Some(variable) = &self.variable {
            cfg.source.variable = variable.clone();
        }
        if let Some(sep) = self.separator {
            if !sep.is_ascii() {
                bail!("separator must be a single ASCII character, got {sep:?}");
            }
            cfg.source.separator = sep as u8;
        }
        if let Some(montage) = &self.montage {
            cfg.montage = montage.clone();
        }
        if let Some(path) = &self.montage_path {
            cfg.montage_path = Some(expand_home(path));
        }
        if let Some(sfreq) = self.sfreq {
            cfg.sfreq = sfreq;
        }
        if self.no_filter {
            cfg.filter = None;
        } else if self.l_freq.is_some() || self.h_freq.is_some() {
            let base = cfg.filter.unwrap_or_default();
            cfg.filter = Some(FilterBand::new(
                self.l_freq.unwrap_or(base.low_hz),
                self.h_freq.unwrap_or(base.high_hz),
            ));
        }
        if let Some(n_jobs) = self.n_jobs {
            cfg.n_jobs = n_jobs;
        }
        if !self.picks.is_empty() {
            let table = match &self.electrodes {
                Some(path) => ElectrodeTable::from_path(expand_home(path))?,
                None => ElectrodeTable::biosemi()?,
            };
            cfg.picks = Some(table.resolve_indices(self.picks.as_slice()).context("resolving --picks")?);
        }
        if let Some(n) = self.n_components {
            cfg.n_components = Some(n);
        }
        if let Some(method) = &self.method {
            cfg.method = method.parse::<Method>()?;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(decim) = self.decim {
            cfg.decim = decim;
        }
        if cfg.input.is_none() {
            bail!("no input recording: pass --input or set \"input\" in --config");
        }
        Ok(cfg)
    }
}

fn component_names(n: usize) -> Vec<String> {
    (0..n).map(|k| format!("ICA{k:03}")).collect()
}

fn written(path: &Path) {
    println!("Written → {}", path.display());
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Components { common, output } => {
            let mut session = Session::new(common.session_config()?);
            session.get_component_maps().context("fitting ICA")?;
            if let (Some(fitted), Some(signal)) = (session.fitted(), session.signal()) {
                info!(
                    "explained variance: {:?}",
                    fitted.explained_variance().iter().map(|v| format!("{v:.3}")).collect::<Vec<_>>()
                );
                write_components(fitted, signal, &output)?;
                written(&output);
            }
        }
        Command::Sources { common, output } => {
            let mut session = Session::new(common.session_config()?);
            let sources = session.get_sources().context("fitting ICA")?;
            let times = session.times()?;
            write_time_series(&sources, &times.to_vec(), &component_names(sources.nrows()), &output)?;
            written(&output);
        }
        Command::Timecourse { common, output } => {
            let cfg = common.session_config()?;
            let picks = cfg.picks.clone();
            let mut session = Session::new(cfg);
            let data = session.get_time_series(picks.as_deref())?;
            let times = session.times()?;
            let names = match (session.signal(), &picks) {
                (Some(signal), Some(p)) => p.iter().map(|&i| signal.ch_names()[i].clone()).collect(),
                (Some(signal), None) => signal.ch_names().to_vec(),
                (None, _) => Vec::new(),
            };
            write_time_series(&data, &times.to_vec(), &names, &output)?;
            written(&output);
        }
        Command::Exclude { common, exclude, output } => {
            let mut session = Session::new(common.session_config()?);
            let cleaned = session
                .exclude(&exclude)
                .with_context(|| format!("excluding components {exclude:?}"))?;
            let times = session.times()?;
            let names = session.signal().map(|s| s.ch_names().to_vec()).unwrap_or_default();
            write_time_series(&cleaned, &times.to_vec(), &names, &output)?;
            written(&output);
        }
    }

    Ok(())
}
