/// Shared helpers: synthetic recordings, montages and temporary files.
use bieg::{ChannelLayout, Montage, RawSignal};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

pub const SFREQ: f64 = 256.0;

#[allow(unused)]
/// Names `E1..En` followed by the three fiducials.
pub fn montage_names(n_channels: usize) -> Vec<String> {
    let mut names: Vec<String> = (1..=n_channels).map(|i| format!("E{i}")).collect();
    names.extend(["Nz", "LPA", "RPA"].map(String::from));
    names
}

#[allow(unused)]
/// `n_channels` electrodes on a ring around the vertex plus fiducials on the
/// equator; `n_channels + 3` entries in total.
pub fn test_montage(n_channels: usize) -> Montage {
    let mut pos = Array2::zeros((n_channels + 3, 3));
    for i in 0..n_channels {
        let az = 2.0 * std::f64::consts::PI * i as f64 / n_channels as f64;
        let pol = 0.3 + 0.6 * (i % 3) as f64 / 3.0;
        pos[[i, 0]] = 85.0 * pol.sin() * az.cos();
        pos[[i, 1]] = 85.0 * pol.sin() * az.sin();
        pos[[i, 2]] = 85.0 * pol.cos();
    }
    let fid = [[0.0, 85.0, 0.0], [-85.0, 0.0, 0.0], [85.0, 0.0, 0.0]];
    for (k, p) in fid.iter().enumerate() {
        for d in 0..3 {
            pos[[n_channels + k, d]] = p[d];
        }
    }
    Montage::new("test", montage_names(n_channels), pos).unwrap()
}

#[allow(unused)]
/// Same montage as [`test_montage`], written as an MNE-style `name x y z` file.
pub fn write_montage_file(n_channels: usize) -> NamedTempFile {
    let m = test_montage(n_channels);
    let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(f, "name x y z").unwrap();
    for (name, p) in m.names().iter().zip(m.positions().rows()) {
        writeln!(f, "{name} {} {} {}", p[0], p[1], p[2]).unwrap();
    }
    f.flush().unwrap();
    f
}

#[allow(unused)]
/// Independent non-Gaussian sources mixed into `n_channels` channels.
///
/// Sources cycle through a sine, a square wave, a sawtooth and Laplacian
/// noise; values are in the tens of microvolts like real EEG.
pub fn mixture(n_channels: usize, n_times: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sources = Array2::from_shape_fn((n_channels, n_times), |(c, t)| {
        let tt = t as f64 / SFREQ;
        let f = 3.0 + 2.3 * c as f64;
        match c % 4 {
            0 => (2.0 * std::f64::consts::PI * f * tt).sin(),
            1 => (2.0 * std::f64::consts::PI * f * tt).sin().signum(),
            2 => ((f * tt) % 1.0) * 2.0 - 1.0,
            _ => 0.0,
        }
    });
    for c in (3..n_channels).step_by(4) {
        for t in 0..n_times {
            let u: f64 = rng.gen_range(-0.5..0.5);
            sources[[c, t]] = -u.signum() * (1.0 - 2.0 * u.abs()).max(1e-12).ln();
        }
    }
    let mixing = Array2::from_shape_fn((n_channels, n_channels), |(i, j)| {
        if i == j { 1.0 } else { rng.gen_range(-0.5..0.5) }
    });
    mixing.dot(&sources) * 2e-5
}

#[allow(unused)]
/// Write `data` one channel per line with `sep` between values.
pub fn write_text_recording(data: &Array2<f64>, sep: char, suffix: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    for row in data.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(f, "{}", line.join(&sep.to_string())).unwrap();
    }
    f.flush().unwrap();
    f
}

#[allow(unused)]
/// An unfiltered signal over [`test_montage`].
pub fn signal_from(data: Array2<f64>) -> RawSignal {
    let montage = test_montage(data.nrows());
    RawSignal::new(data, ChannelLayout::from_montage(&montage, SFREQ)).unwrap()
}

#[allow(unused)]
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "shape mismatch");
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
pub fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}
