//! 2-D sensor layout projected from a 3-D montage.
//!
//! Projection follows `mne.channels.make_eeg_layout`:
//!
//! 1. Cartesian → spherical `(r, azimuth, polar)`.
//! 2. Azimuthal-equidistant map: `x = polar·cos(az)`, `y = polar·sin(az)`.
//! 3. Scale so the furthest coordinate sits at radius 0.5, then shift the
//!    centre to `(0.5, 0.5)`.
//!
//! Scaling uses every montage entry; the trailing auxiliary entries are
//! dropped afterwards, so a montage with `K` entries yields `K - 3` channels.
use ndarray::{Array2, Axis};

use crate::montage::{Montage, N_AUX};

const RADIUS: f64 = 0.5;

/// Channel names, 2-D positions and sampling rate of a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    names: Vec<String>,
    /// `[C, 2]` box centres in the unit square.
    pos: Array2<f64>,
    /// Width and height of one sensor box.
    box_size: (f64, f64),
    sfreq: f64,
}

impl ChannelLayout {
    /// Project `montage` and drop its auxiliary entries.
    pub fn from_montage(montage: &Montage, sfreq: f64) -> Self {
        let mut pos = project_to_plane(montage.positions());

        let scale = pos
            .iter()
            .fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        if scale > 0.0 {
            pos.mapv_inplace(|v| v * RADIUS / scale);
        }

        let n_eeg = montage.n_eeg();
        let pos = pos.slice(ndarray::s![..n_eeg, ..]).to_owned();
        let box_size = box_size(&pos);
        let pos = pos.mapv(|v| v + 0.5);
        let names = montage.names()[..montage.len() - N_AUX].to_vec();

        Self { names, pos, box_size, sfreq }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `[C, 2]` positions.
    pub fn positions(&self) -> &Array2<f64> {
        &self.pos
    }

    /// Positions of the given channels, `[picks.len(), 2]`.
    pub fn positions_of(&self, picks: &[usize]) -> Array2<f64> {
        self.pos.select(Axis(0), picks)
    }

    pub fn box_size(&self) -> (f64, f64) {
        self.box_size
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Azimuthal-equidistant projection of `[K, 3]` points onto `[K, 2]`.
pub fn project_to_plane(pos3d: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((pos3d.nrows(), 2));
    for (p, mut o) in pos3d.rows().into_iter().zip(out.rows_mut()) {
        let (x, y, z) = (p[0], p[1], p[2]);
        let r = (x * x + y * y + z * z).sqrt();
        if r == 0.0 {
            continue;
        }
        let az = y.atan2(x);
        let pol = (z / r).clamp(-1.0, 1.0).acos();
        o[0] = pol * az.cos();
        o[1] = pol * az.sin();
    }
    out
}

/// Square box fitting between the two closest sensors (90 % of the gap).
fn box_size(pos: &Array2<f64>) -> (f64, f64) {
    let n = pos.nrows();
    let mut min_d = f64::INFINITY;
    for i in 0..n {
        for j in i + 1..n {
            let dx = pos[[i, 0]] - pos[[j, 0]];
            let dy = pos[[i, 1]] - pos[[j, 1]];
            let d = (dx * dx + dy * dy).sqrt();
            if d > 0.0 {
                min_d = min_d.min(d);
            }
        }
    }
    if !min_d.is_finite() {
        min_d = 0.1;
    }
    let side = 0.9 * min_d / std::f64::consts::SQRT_2;
    (side, side)
}
