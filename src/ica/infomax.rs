//! Infomax ICA (Bell & Sejnowski) and its extended variant (Lee et al.).
//!
//! Matches `mne.preprocessing.infomax`: natural-gradient updates over random
//! blocks of samples, learning-rate annealing when the weight change direction
//! turns by more than `anneal_deg`, and restart with a smaller learning rate on
//! weight blow-up. The extended variant switches each component between a
//! sub- and super-Gaussian contrast from a running kurtosis estimate.
use log::{debug, trace, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{Decomposer, Unmixing};
use crate::error::{Error, Result};

const MAX_WEIGHT: f64 = 1e8;
const RESTART_FAC: f64 = 0.9;
const MIN_L_RATE: f64 = 1e-10;
const EXT_MOMENTUM: f64 = 0.5;
const SIGNS_BIAS: f64 = 0.02;
const SIGNCOUNT_THRESHOLD: usize = 25;
const SIGNCOUNT_STEP: usize = 2;

#[derive(Debug, Clone)]
pub struct Infomax {
    pub extended: bool,
    pub max_iter: usize,
    /// Stop once the squared weight change drops below this.
    pub w_change: f64,
    pub anneal_deg: f64,
    pub anneal_step: f64,
    pub blowup: f64,
    pub blowup_fac: f64,
    /// Stop after this many consecutive epochs without annealing.
    pub n_small_angle: Option<usize>,
    /// Components initially treated as sub-Gaussian (extended only).
    pub n_subgauss: usize,
    pub kurt_size: usize,
    pub ext_blocks: usize,
    pub use_bias: bool,
}

impl Infomax {
    pub fn new(extended: bool) -> Self {
        Self {
            extended,
            max_iter: 200,
            w_change: 1e-12,
            anneal_deg: 60.0,
            anneal_step: 0.9,
            blowup: 1e4,
            blowup_fac: 0.5,
            n_small_angle: Some(20),
            n_subgauss: 1,
            kurt_size: 6000,
            ext_blocks: 1,
            use_bias: true,
        }
    }

    fn initial_signs(&self, k: usize) -> Array1<f64> {
        Array1::from_shape_fn(k, |i| if i < self.n_subgauss { -1.0 } else { 1.0 })
    }
}

impl Decomposer for Infomax {
    fn name(&self) -> &str {
        if self.extended { "extended-infomax" } else { "infomax" }
    }

    fn unmix(&self, white: ArrayView2<f64>, rng: &mut StdRng) -> Result<Unmixing> {
        // Samples along rows, as in MNE.
        let data = white.t();
        let (n_samples, k) = data.dim();
        let k_sq = k * k;

        let mut l_rate = 0.01 / (k_sq.max(2) as f64).ln();
        let block = ((n_samples as f64 / 3.0).sqrt().floor() as usize).max(1);
        let n_block = n_samples / block;
        if n_block == 0 {
            return Err(Error::Decomposition(format!("infomax: only {n_samples} samples")));
        }
        let last_t = (n_block - 1) * block + 1;

        let start_weights = Array2::<f64>::eye(k);
        let mut weights = start_weights.clone();
        let mut old_weights = start_weights.clone();
        let bi = Array2::<f64>::eye(k) * block as f64;
        let mut bias = Array1::<f64>::zeros(k);

        let mut step = 0usize;
        let mut max_iter = self.max_iter;
        let mut count_small_angle = 0usize;
        let mut blockno = 0usize;
        let mut signcount = 0usize;
        let mut ext_blocks = self.ext_blocks;

        let kurt_size = self.kurt_size.min(n_samples);
        let mut signs = self.initial_signs(k);
        let mut old_kurt = Array1::<f64>::zeros(k);
        let mut old_signs = Array1::<f64>::zeros(k);

        let mut old_delta = Array1::<f64>::ones(k_sq);
        let mut old_change = 0.0_f64;
        let mut converged = false;

        let mut permute: Vec<usize> = (0..n_samples).collect();

        while step < max_iter {
            permute.shuffle(rng);
            let mut blowup = false;

            for t in (0..last_t).step_by(block) {
                let rows = &permute[t..t + block];
                let mut u = data.select(Axis(0), rows).dot(&weights);
                u += &bias;

                if self.extended {
                    let y = u.mapv(f64::tanh);
                    let mut uty = u.t().dot(&y);
                    uty *= &signs;
                    let grad = &bi - &uty - &u.t().dot(&u);
                    weights.scaled_add(l_rate, &weights.dot(&grad));
                    if self.use_bias {
                        bias.scaled_add(-2.0 * l_rate, &y.sum_axis(Axis(0)));
                    }
                } else {
                    let one_minus_2y = u.mapv(|v| 1.0 - 2.0 / (1.0 + (-v).exp()));
                    let grad = &bi + &u.t().dot(&one_minus_2y);
                    weights.scaled_add(l_rate, &weights.dot(&grad));
                    if self.use_bias {
                        bias.scaled_add(l_rate, &one_minus_2y.sum_axis(Axis(0)));
                    }
                }

                let max_abs = weights.iter().fold(0.0_f64, |a, w| a.max(w.abs()));
                if max_abs > MAX_WEIGHT || !max_abs.is_finite() {
                    blowup = true;
                }
                blockno += 1;
                if blowup {
                    break;
                }

                if self.extended && ext_blocks > 0 && blockno % ext_blocks == 0 {
                    let act = if kurt_size < n_samples {
                        let rp: Vec<usize> = (0..kurt_size)
                            .map(|_| (rng.gen::<f64>() * (n_samples - 1) as f64).floor() as usize)
                            .collect();
                        data.select(Axis(0), &rp).dot(&weights)
                    } else {
                        data.dot(&weights)
                    };
                    let mut kurt = kurtosis_columns(&act);
                    kurt = &old_kurt * EXT_MOMENTUM + &kurt * (1.0 - EXT_MOMENTUM);
                    old_kurt = kurt.clone();

                    signs = kurt.mapv(|v| sign(v + SIGNS_BIAS));
                    let n_diff = signs.iter().zip(old_signs.iter()).filter(|(a, b)| a != b).count();
                    if n_diff == 0 {
                        signcount += 1;
                    } else {
                        signcount = 0;
                    }
                    old_signs = signs.clone();
                    if signcount >= SIGNCOUNT_THRESHOLD {
                        ext_blocks *= SIGNCOUNT_STEP;
                        signcount = 0;
                    }
                }
            }

            if !blowup {
                let delta = Array1::from_iter((&weights - &old_weights).iter().copied());
                step += 1;
                let change = delta.dot(&delta);
                let mut angle_delta = 0.0;
                if step > 2 {
                    let cos = delta.dot(&old_delta) / (change * old_change).sqrt();
                    angle_delta = cos.clamp(-1.0, 1.0).acos().to_degrees();
                }
                trace!("infomax step {step}: lrate {l_rate:.3e}, wchange {change:.3e}, angle {angle_delta:.1}°");

                old_weights.assign(&weights);
                if angle_delta > self.anneal_deg {
                    l_rate *= self.anneal_step;
                    old_delta = delta;
                    old_change = change;
                    count_small_angle = 0;
                } else {
                    if step == 1 {
                        old_delta = delta;
                        old_change = change;
                    }
                    if let Some(limit) = self.n_small_angle {
                        count_small_angle += 1;
                        if count_small_angle > limit {
                            max_iter = step;
                            converged = true;
                        }
                    }
                }

                if step > 2 && change < self.w_change {
                    step = max_iter;
                    converged = true;
                } else if change > self.blowup {
                    l_rate *= self.blowup_fac;
                }
            } else {
                step = 0;
                blockno = 1;
                l_rate *= RESTART_FAC;
                weights.assign(&start_weights);
                old_weights.assign(&start_weights);
                old_delta = Array1::zeros(k_sq);
                bias.fill(0.0);
                ext_blocks = self.ext_blocks;
                if self.extended {
                    signs = self.initial_signs(k);
                    old_signs = Array1::zeros(k);
                }
                if l_rate > MIN_L_RATE {
                    debug!("infomax: weight blow-up, lowering learning rate to {l_rate:.3e}");
                } else {
                    return Err(Error::Decomposition(
                        "infomax: unmixing matrix might not be invertible".into(),
                    ));
                }
            }
        }

        if !converged {
            warn!("{} did not converge after {max_iter} steps", self.name());
        }
        Ok(Unmixing { matrix: weights.t().to_owned(), n_iter: Some(step), converged: Some(converged) })
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Fisher (excess) kurtosis of every column, biased moments.
pub(crate) fn kurtosis_columns(x: &Array2<f64>) -> Array1<f64> {
    let n = x.nrows() as f64;
    Array1::from_iter(x.columns().into_iter().map(|col| {
        let mean = col.sum() / n;
        let (m2, m4) = col.iter().fold((0.0, 0.0), |(m2, m4), &v| {
            let d2 = (v - mean) * (v - mean);
            (m2 + d2, m4 + d2 * d2)
        });
        let (m2, m4) = (m2 / n, m4 / n);
        if m2 > 0.0 { m4 / (m2 * m2) - 3.0 } else { 0.0 }
    }))
}
