//! Dataset loading and safetensors export.
//!
//! Reader side: turns a `.mat` archive or a delimited text file into a
//! [`RawRecording`] (`[C, T]`, `f64`, values passed through as stored).
//!
//! Writer side: [`StWriter`] and the `write_*` helpers dump fitted components
//! and time series to safetensors so an external plotting tool can render
//! them without linking against this crate.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array, Array2, IxDyn, ShapeBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ica::FittedDecomposition;
use crate::signal::RawSignal;

/// Default variable name looked up in `.mat` archives.
pub const DEFAULT_VARIABLE: &str = "EEGdata";

/// Default field separator for delimited text.
pub const DEFAULT_SEPARATOR: u8 = b'\t';

/// How to extract the matrix from a file.
///
/// `variable` is consulted for `.mat` archives, `separator` for delimited
/// text; the other field is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSource {
    pub variable: String,
    pub separator: u8,
}

impl Default for RecordingSource {
    fn default() -> Self {
        Self {
            variable: DEFAULT_VARIABLE.to_string(),
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl RecordingSource {
    /// Default source with a different text separator.
    pub fn with_separator(separator: u8) -> Self {
        Self { separator, ..Self::default() }
    }

    /// Default source with a different `.mat` variable name.
    pub fn with_variable(variable: impl Into<String>) -> Self {
        Self { variable: variable.into(), ..Self::default() }
    }
}

/// Supported on-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// MATLAB v5 archive.
    Mat,
    /// `txt`, `csv` or `tsv`, one channel per line.
    Delimited,
}

impl Format {
    /// Pick the format from the (case-insensitive) file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "mat" => Ok(Format::Mat),
            "txt" | "csv" | "tsv" => Ok(Format::Delimited),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext,
            }),
        }
    }
}

/// A loaded `[C, T]` recording and where it came from.
#[derive(Debug, Clone)]
pub struct RawRecording {
    pub data: Array2<f64>,
    pub path: PathBuf,
    pub source: RecordingSource,
}

impl RawRecording {
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }
}

/// Load a recording, dispatching on the file extension.
pub fn load_recording(path: impl AsRef<Path>, source: &RecordingSource) -> Result<RawRecording> {
    let path = path.as_ref();
    let data = match Format::from_path(path)? {
        Format::Mat => load_mat(path, &source.variable)?,
        Format::Delimited => load_delimited(path, source.separator)?,
    };
    info!(
        "loaded {} ch × {} samples from {}",
        data.nrows(),
        data.ncols(),
        path.display()
    );
    Ok(RawRecording {
        data,
        path: path.to_path_buf(),
        source: source.clone(),
    })
}

// ── MATLAB v5 ────────────────────────────────────────────────────────────────

/// Extract the 2-D numeric variable `name` from a `.mat` archive.
///
/// MATLAB stores matrices column-major; the returned array keeps the
/// variable's `[rows, cols]` orientation.
pub fn load_mat(path: &Path, name: &str) -> Result<Array2<f64>> {
    let file = BufReader::new(File::open(path)?);
    let mat = matfile::MatFile::parse(file).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("invalid MAT archive: {e:?}"),
    })?;

    let array = mat.find_by_name(name).ok_or_else(|| Error::MissingVariable {
        path: path.to_path_buf(),
        name: name.to_string(),
    })?;

    let size = array.size();
    if size.len() != 2 {
        return Err(Error::Parse {
            path: path.to_path_buf(),
            line: 0,
            reason: format!("variable {name:?} has shape {size:?}, expected 2-D"),
        });
    }
    let (rows, cols) = (size[0], size[1]);
    debug!("mat variable {name:?}: {rows} × {cols}");

    let flat = numeric_to_f64(array.data());
    Array2::from_shape_vec((rows, cols).f(), flat)
        .map(|a| a.as_standard_layout().into_owned())
        .map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            line: 0,
            reason: format!("variable {name:?}: {e}"),
        })
}

fn numeric_to_f64(data: &matfile::NumericData) -> Vec<f64> {
    use matfile::NumericData::*;
    match data {
        Double { real, .. } => real.clone(),
        Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
    }
}

// ── Delimited text ───────────────────────────────────────────────────────────

/// Parse a delimited numeric matrix, one row per line.
///
/// Lines starting with `#` are comments. Every row must have the same number
/// of fields and every field must parse as a float.
pub fn load_delimited(path: &Path, separator: u8) -> Result<Array2<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut values: Vec<f64> = Vec::new();
    let mut n_cols: Option<usize> = None;
    let mut n_rows = 0;

    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(n_rows + 1);

        match n_cols {
            None => n_cols = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(Error::Parse {
                    path: path.to_path_buf(),
                    line,
                    reason: format!("expected {n} columns, found {}", record.len()),
                });
            }
            Some(_) => {}
        }

        for field in record.iter() {
            let v: f64 = field.parse().map_err(|_| Error::Parse {
                path: path.to_path_buf(),
                line,
                reason: format!("non-numeric token {field:?}"),
            })?;
            values.push(v);
        }
        n_rows += 1;
    }

    let n_cols = n_cols.ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        line: 0,
        reason: "file contains no data rows".into(),
    })?;

    Array2::from_shape_vec((n_rows, n_cols), values).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        line: 0,
        reason: e.to_string(),
    })
}

// ── Safetensors writer ───────────────────────────────────────────────────────

/// Minimal safetensors writer for F64, I32 and U8 tensors.
///
/// ```rust,no_run
/// use bieg::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Store strings as a newline-joined U8 tensor.
    pub fn add_names(&mut self, name: &str, names: &[String]) {
        let bytes = names.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map).map_err(std::io::Error::from)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = File::create(path)?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        debug!("wrote {} tensors → {}", self.entries.len(), path.display());
        Ok(())
    }
}

/// Write component maps, mixing/unmixing matrices and the picked channels'
/// layout for topographic rendering.
///
/// Keys: `maps [P, K]`, `mixing [K, K]`, `unmixing [K, K]`, `pos [P, 2]`,
/// `explained_variance [K]`, `picks [P]`, `ch_names` (U8, newline-joined).
pub fn write_components(fitted: &FittedDecomposition, signal: &RawSignal, path: &Path) -> Result<()> {
    let layout = signal.layout();
    let picks = fitted.picks();
    let pos = layout.positions_of(picks);
    let names: Vec<String> = picks.iter().map(|&i| layout.names()[i].clone()).collect();
    let picks_i32: Vec<i32> = picks.iter().map(|&i| i as i32).collect();

    let mut w = StWriter::new();
    w.add_f64_arr2("maps", fitted.maps());
    w.add_f64_arr2("mixing", fitted.mixing());
    w.add_f64_arr2("unmixing", fitted.unmixing());
    w.add_f64_arr2("pos", &pos);
    w.add_f64(
        "explained_variance",
        fitted.explained_variance().as_slice().unwrap_or(&[]),
        &[fitted.n_components()],
    );
    w.add_i32("picks", &picks_i32, &[picks.len()]);
    w.add_names("ch_names", &names);
    w.write(path)
}

/// Write a `[C, T]` time series with its time axis and channel names.
///
/// Keys: `data [C, T]`, `times [T]`, `ch_names` (U8, newline-joined).
pub fn write_time_series(data: &Array2<f64>, times: &[f64], names: &[String], path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", data);
    w.add_f64("times", times, &[times.len()]);
    w.add_names("ch_names", names);
    w.write(path)
}

// ── Safetensors reader ───────────────────────────────────────────────────────

/// Read every numeric tensor of a safetensors file as `f64`.
///
/// Handles F64, F32 and I32; other dtypes are skipped.
pub fn read_f64_tensors(path: &Path) -> Result<HashMap<String, Array<f64, IxDyn>>> {
    let bytes = std::fs::read(path)?;
    let bad = |reason: &str| Error::Parse {
        path: path.to_path_buf(),
        line: 0,
        reason: reason.to_string(),
    };

    if bytes.len() < 8 {
        return Err(bad("safetensors file too small"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len_bytes) as usize;
    let data_start = 8 + n;
    if bytes.len() < data_start {
        return Err(bad("truncated header"));
    }
    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..data_start]).map_err(|e| bad(&e.to_string()))?;

    let mut out = HashMap::new();
    for (key, val) in &header {
        if key == "__metadata__" {
            continue;
        }
        let dtype = val["dtype"].as_str().ok_or_else(|| bad("missing dtype"))?;
        let offsets = val["data_offsets"]
            .as_array()
            .ok_or_else(|| bad("missing data_offsets"))?;
        let s = offsets.first().and_then(|v| v.as_u64()).ok_or_else(|| bad("bad offset"))? as usize;
        let e = offsets.get(1).and_then(|v| v.as_u64()).ok_or_else(|| bad("bad offset"))? as usize;
        let raw = bytes
            .get(data_start + s..data_start + e)
            .ok_or_else(|| bad("tensor out of bounds"))?;
        let shape: Vec<usize> = val["shape"]
            .as_array()
            .ok_or_else(|| bad("missing shape"))?
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as usize)
            .collect();

        let vals: Vec<f64> = match dtype {
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            "F32" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "I32" => raw
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            _ => continue,
        };
        let arr = Array::from_shape_vec(IxDyn(&shape), vals).map_err(|e| bad(&e.to_string()))?;
        out.insert(key.clone(), arr);
    }
    Ok(out)
}

/// Read a newline-joined U8 name tensor written by [`StWriter::add_names`].
pub fn read_names(path: &Path, key: &str) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let bad = |reason: String| Error::Parse {
        path: path.to_path_buf(),
        line: 0,
        reason,
    };
    if bytes.len() < 8 {
        return Err(bad("safetensors file too small".into()));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[..8]);
    let data_start = 8 + u64::from_le_bytes(len_bytes) as usize;
    let header: serde_json::Value = serde_json::from_slice(
        bytes.get(8..data_start).ok_or_else(|| bad("truncated header".into()))?,
    )
    .map_err(|e| bad(e.to_string()))?;
    let entry = header.get(key).ok_or_else(|| bad(format!("missing {key:?} key")))?;
    let s = entry["data_offsets"][0].as_u64().unwrap_or(0) as usize;
    let e = entry["data_offsets"][1].as_u64().unwrap_or(0) as usize;
    let raw = bytes
        .get(data_start + s..data_start + e)
        .ok_or_else(|| bad("tensor out of bounds".into()))?;
    let text = std::str::from_utf8(raw).map_err(|e| bad(e.to_string()))?;
    Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
}
