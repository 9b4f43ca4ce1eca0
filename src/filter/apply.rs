//! Overlap-add zero-phase FIR convolution.
//!
//! Matches MNE's `_overlap_add_filter` + `_1d_overlap_filter`.
//!
//! Zero-phase is achieved by shifting the output left by `(N-1)/2` samples,
//! NOT by running filtfilt. The edge transient is suppressed by
//! reflect-limited padding of `N-1` samples on each side.
use std::sync::Arc;

use log::debug;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{Error, Result};

/// Apply a zero-phase FIR filter to each channel of `data` ([C, T]) in place.
///
/// Channels are filtered independently on up to `n_jobs` threads; the output
/// does not depend on `n_jobs`. `h` must have odd length.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64], n_jobs: usize) -> Result<()> {
    if h.len() % 2 == 0 {
        return Err(Error::InvalidFilter(format!("kernel length {} is even", h.len())));
    }
    let n_jobs = n_jobs.max(1);
    debug!(
        "filtering {} ch × {} samples with {} taps on {n_jobs} thread(s)",
        data.nrows(),
        data.ncols(),
        h.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .map_err(|e| Error::InvalidFilter(format!("cannot start filter workers: {e}")))?;

    let plan = OverlapAdd::new(h, data.ncols());
    let rows: Vec<Vec<f64>> = data.rows().into_iter().map(|r| r.to_vec()).collect();
    let filtered: Vec<Vec<f64>> = pool.install(|| rows.par_iter().map(|row| plan.run(row)).collect());

    for (mut row, out) in data.rows_mut().into_iter().zip(filtered.iter()) {
        row.assign(&ArrayView1::from(out.as_slice()));
    }
    Ok(())
}

/// Filter a single 1-D signal with the overlap-add algorithm.
///
/// Returns a vector of the same length as `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Vec<f64> {
    OverlapAdd::new(h, x.len()).run(x)
}

// ── Overlap-add plan ─────────────────────────────────────────────────────────

/// FFT plans and kernel spectrum for one kernel and signal length, shared by
/// every channel of a recording.
struct OverlapAdd {
    n_h: usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    fn new(h: &[f64], n_x: usize) -> Self {
        let n_h = h.len();
        // Padded length is n_x + 2 (n_h - 1).
        let n_fft = choose_fft_len(n_h, n_x + 2 * n_h.saturating_sub(1));
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);
        let mut h_fft = to_complex(h, n_fft);
        forward.process(&mut h_fft);
        Self { n_h, n_fft, h_fft, forward, inverse }
    }

    fn run(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return vec![];
        }
        let edge = self.n_h - 1;
        let delay = edge / 2;
        let padded = reflect_limited_pad(x, edge, edge);
        let block = self.n_fft - self.n_h + 1;
        let scale = 1.0 / self.n_fft as f64;

        let mut acc = vec![0.0_f64; padded.len()];
        for (b, chunk) in padded.chunks(block).enumerate() {
            let start = b * block;
            let mut buf = to_complex(chunk, self.n_fft);
            self.forward.process(&mut buf);
            buf.iter_mut().zip(&self.h_fft).for_each(|(v, hf)| *v *= *hf);
            self.inverse.process(&mut buf);

            // Output sample i of this block lands at start + i - delay.
            for (i, v) in buf.iter().enumerate() {
                let Some(dst) = (start + i).checked_sub(delay) else { continue };
                match acc.get_mut(dst) {
                    Some(a) => *a += v.re * scale,
                    None => break,
                }
            }
        }
        acc.drain(edge..edge + x.len()).collect()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Reflect-limited padding (MNE `_smart_pad`): each side is the signal
/// mirrored through its end point, zero-filled beyond `len - 1` samples.
fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let (l, r) = (n_l.min(n - 1), n_r.min(n - 1));

    let left = x[1..=l].iter().rev().map(|&v| 2.0 * first - v);
    let right = x[n - 1 - r..n - 1].iter().rev().map(|&v| 2.0 * last - v);

    std::iter::repeat(0.0)
        .take(n_l - l)
        .chain(left)
        .chain(x.iter().copied())
        .chain(right)
        .chain(std::iter::repeat(0.0).take(n_r - r))
        .collect()
}

/// Choose the FFT block size (power of 2 minimising operation count).
///
/// Matches MNE's cost function:
///   `cost = ceil(n_x / (N - n_h + 1)) * N * (log2(N) + 1) + 4e-5 * N * n_x`
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;

    let max_pow = (n_x as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1_usize << max_pow.max(min_pow);
    let mut best_cost = f64::INFINITY;

    for pow in min_pow..=max_pow {
        let n = 1_usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
            + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}

/// Real samples as a zero-padded complex buffer of length `n`.
fn to_complex(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    x.iter()
        .map(|&re| Complex { re, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n)
        .collect()
}
