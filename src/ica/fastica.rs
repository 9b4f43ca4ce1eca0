//! Parallel FastICA with the logcosh contrast, backed by `linfa-ica`.
//!
//! linfa centres and whitens its input again; on already-whitened data that
//! second pass is a near-identity rotation, so the recovered components are
//! still an unmixing matrix in our whitened space:
//!
//! ```text
//! white [K, N]  ──transpose──▶  Dataset [N, K]
//!                                  │ FastIca::params().ncomponents(K).random_state(seed)
//!                                  ▼
//!                        predict(x) = (x − m) Cᵀ
//!    C = (predict(I) − predict(0))ᵀ   [K, K]
//! ```
use linfa::prelude::*;
use linfa_ica::fast_ica::FastIca as LinfaFastIca;
use log::debug;
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;

use super::{Decomposer, Unmixing};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FastIca {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for FastIca {
    fn default() -> Self {
        Self { max_iter: 200, tol: 1e-4 }
    }
}

impl Decomposer for FastIca {
    fn name(&self) -> &str {
        "fastica"
    }

    fn unmix(&self, white: ArrayView2<f64>, rng: &mut StdRng) -> Result<Unmixing> {
        let k = white.nrows();
        // linfa keeps its own generator; derive its seed from ours.
        let random_state = rng.gen::<u32>() as usize;
        debug!("fastica: {k} components, random_state = {random_state}");

        let dataset = DatasetBase::from(white.t().to_owned());
        // Default contrast is logcosh with alpha = 1.
        let model = LinfaFastIca::<f64>::params()
            .ncomponents(k)
            .max_iter(self.max_iter)
            .tol(self.tol)
            .random_state(random_state)
            .fit(&dataset)
            .map_err(|e| Error::Decomposition(format!("FastICA failed: {e}")))?;

        let offset = model.predict(&Array2::<f64>::zeros((1, k)));
        let mut components_t = model.predict(&Array2::<f64>::eye(k));
        components_t -= &offset;

        Ok(Unmixing { matrix: components_t.t().to_owned(), n_iter: None, converged: None })
    }
}
