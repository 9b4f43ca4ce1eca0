//! Electrode montages: channel names with 3-D head-surface positions.
//!
//! By convention the last three entries of a montage are auxiliary
//! references (fiducials such as `Nz`, `LPA`, `RPA`) rather than recording
//! channels; [`crate::layout`] drops them when building the 2-D layout.
//!
//! Sources:
//! - [`Montage::builtin`]: BioSemi alphabetic caps (`biosemi16` through
//!   `biosemi256`) on an approximate equal-area placement.
//! - [`Montage::from_path`]: MNE-style text montage, one electrode per line,
//!   either `name theta phi` (spherical, degrees, BESA convention) or
//!   `name x y z` (Cartesian). A non-numeric first line is a header.
//! - [`Montage::from_coords_path`]: bare coordinate matrix plus names, with
//!   optional `[0, 1]` min-max scaling.
use std::f64::consts::PI;
use std::path::Path;

use log::debug;
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::normalize::min_max_scale_columns;

/// Number of trailing non-EEG entries every montage carries.
pub const N_AUX: usize = 3;

/// Sphere radius used for spherical montage files (mm, as in MNE).
const SPHERE_RADIUS: f64 = 85.0;

/// Names plus `[K, 3]` positions.
#[derive(Debug, Clone)]
pub struct Montage {
    kind: String,
    names: Vec<String>,
    pos: Array2<f64>,
}

impl Montage {
    /// Build a montage from explicit names and `[K, 3]` positions.
    pub fn new(kind: impl Into<String>, names: Vec<String>, pos: Array2<f64>) -> Result<Self> {
        let kind = kind.into();
        if pos.ncols() != 3 || pos.nrows() != names.len() {
            return Err(Error::Parse {
                path: kind.clone().into(),
                line: 0,
                reason: format!(
                    "{} names but positions have shape {:?}",
                    names.len(),
                    pos.shape()
                ),
            });
        }
        if names.len() <= N_AUX {
            return Err(Error::Parse {
                path: kind.clone().into(),
                line: 0,
                reason: format!("montage needs more than {N_AUX} entries, got {}", names.len()),
            });
        }
        Ok(Self { kind, names, pos })
    }

    /// A built-in BioSemi montage by name.
    pub fn builtin(kind: &str) -> Result<Self> {
        let n_eeg = match kind {
            "biosemi16" => 16,
            "biosemi32" => 32,
            "biosemi64" => 64,
            "biosemi128" => 128,
            "biosemi160" => 160,
            "biosemi256" => 256,
            _ => return Err(Error::UnknownMontage(kind.to_string())),
        };

        // 32 electrodes per lettered bank: A1..A32, B1..B32, ...
        let mut names: Vec<String> = (0..n_eeg)
            .map(|i| format!("{}{}", (b'A' + (i / 32) as u8) as char, i % 32 + 1))
            .collect();
        names.extend(["Nz", "LPA", "RPA"].map(String::from));

        let mut pos = Array2::zeros((n_eeg + N_AUX, 3));
        for (i, p) in spiral_cap(n_eeg).into_iter().enumerate() {
            pos.row_mut(i).assign(&ndarray::arr1(&p));
        }
        let r = SPHERE_RADIUS;
        for (k, p) in [[0.0, r, -0.1 * r], [-r, 0.0, -0.1 * r], [r, 0.0, -0.1 * r]]
            .iter()
            .enumerate()
        {
            pos.row_mut(n_eeg + k).assign(&ndarray::arr1(p));
        }
        debug!("built-in montage {kind}: {} entries", names.len());
        Self::new(kind, names, pos)
    }

    /// Read an MNE-style text montage.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let kind = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom")
            .to_string();

        let mut names = Vec::new();
        let mut rows: Vec<[f64; 3]> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() || fields[0].starts_with('#') {
                continue;
            }
            let nums: std::result::Result<Vec<f64>, _> =
                fields[1..].iter().map(|f| f.parse::<f64>()).collect();
            let nums = match nums {
                Ok(n) => n,
                // Header line.
                Err(_) if names.is_empty() => continue,
                Err(_) => {
                    return Err(Error::Parse {
                        path: path.to_path_buf(),
                        line: i + 1,
                        reason: "non-numeric coordinate".into(),
                    })
                }
            };
            let xyz = match nums.as_slice() {
                [theta, phi] => spherical_to_cartesian(*theta, *phi),
                [x, y, z] => [*x, *y, *z],
                _ => {
                    return Err(Error::Parse {
                        path: path.to_path_buf(),
                        line: i + 1,
                        reason: format!("expected 2 or 3 coordinates, found {}", nums.len()),
                    })
                }
            };
            names.push(fields[0].to_string());
            rows.push(xyz);
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let pos = Array2::from_shape_vec((rows.len(), 3), flat).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            line: 0,
            reason: e.to_string(),
        })?;
        Self::new(kind, names, pos)
    }

    /// Pair `names` with a `[K, 3]` coordinate matrix read from a delimited file.
    ///
    /// With `scale_0_1`, every coordinate column is min-max scaled to `[0, 1]`.
    pub fn from_coords_path(
        path: impl AsRef<Path>,
        names: Vec<String>,
        separator: u8,
        scale_0_1: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut pos = crate::io::load_delimited(path, separator)?;
        if scale_0_1 {
            min_max_scale_columns(&mut pos);
        }
        let kind = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom")
            .to_string();
        Self::new(kind, names, pos)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All names, auxiliary entries included.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `[K, 3]` positions, auxiliary entries included.
    pub fn positions(&self) -> &Array2<f64> {
        &self.pos
    }

    /// Total entries `K`.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Recording channels, i.e. `K - 3`.
    pub fn n_eeg(&self) -> usize {
        self.names.len() - N_AUX
    }
}

/// BESA-style `(theta, phi)` in degrees → Cartesian on an 85 mm sphere.
fn spherical_to_cartesian(theta_deg: f64, phi_deg: f64) -> [f64; 3] {
    let pol = theta_deg.to_radians();
    let az = phi_deg.to_radians();
    [
        SPHERE_RADIUS * pol.sin() * az.cos(),
        SPHERE_RADIUS * pol.sin() * az.sin(),
        SPHERE_RADIUS * pol.cos(),
    ]
}

/// `n` points spiralling down from the vertex to slightly below the equator,
/// one per equal-area band (golden-angle spacing).
fn spiral_cap(n: usize) -> Vec<[f64; 3]> {
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    let z_min = -0.25;
    (0..n)
        .map(|i| {
            let z = 1.0 - (i as f64 + 0.5) / n as f64 * (1.0 - z_min);
            let r = (1.0 - z * z).max(0.0).sqrt();
            let phi = PI / 2.0 + golden * i as f64;
            [
                SPHERE_RADIUS * r * phi.cos(),
                SPHERE_RADIUS * r * phi.sin(),
                SPHERE_RADIUS * z,
            ]
        })
        .collect()
}
