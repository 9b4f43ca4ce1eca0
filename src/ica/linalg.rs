//! Small dense linear algebra for the ICA pipeline.
//!
//! Matrices here are at most a few hundred rows (one per picked channel), so
//! plain Jacobi rotations and Gauss–Jordan elimination are enough and keep the
//! crate free of BLAS/LAPACK. Every routine is deterministic: same input, same
//! bits out.
use ndarray::{Array1, Array2, Axis};

use crate::error::{Error, Result};

const MAX_SWEEPS: usize = 100;

/// Eigendecomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` sorted by descending eigenvalue;
/// eigenvectors are the columns of the second matrix, each sign-fixed so its
/// largest-magnitude entry is positive.
pub fn symmetric_eigen(a: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::Decomposition(format!("eigen: matrix is {:?}, not square", a.dim())));
    }
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    let total: f64 = m.iter().map(|x| x * x).sum();
    let mut converged = n < 2 || total == 0.0;
    for _ in 0..MAX_SWEEPS {
        if converged {
            break;
        }
        let off: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| m[[p, q]] * m[[p, q]])
            .sum();
        if off <= 1e-26 * total {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
                m[[p, q]] = 0.0;
                m[[q, p]] = 0.0;
            }
        }
    }
    if !converged {
        return Err(Error::Decomposition("Jacobi eigensolver did not converge".into()));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| m[[j, j]].total_cmp(&m[[i, i]]).then(i.cmp(&j)));

    let values = Array1::from_iter(order.iter().map(|&i| m[[i, i]]));
    let mut vectors = v.select(Axis(1), &order);
    for mut col in vectors.columns_mut() {
        let pivot = col
            .iter()
            .copied()
            .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            col.mapv_inplace(|x| -x);
        }
    }
    Ok((values, vectors))
}

/// Inverse of a square matrix by Gauss–Jordan elimination with partial pivoting.
pub fn inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::Decomposition(format!("inverse: matrix is {:?}, not square", a.dim())));
    }
    let scale = a.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 {
        return Err(Error::Decomposition("matrix is singular".into()));
    }

    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    aug.slice_mut(ndarray::s![.., ..n]).assign(a);
    for i in 0..n {
        aug[[i, n + i]] = 1.0;
    }

    for i in 0..n {
        let mut max_row = i;
        for k in i + 1..n {
            if aug[[k, i]].abs() > aug[[max_row, i]].abs() {
                max_row = k;
            }
        }
        if max_row != i {
            for j in 0..2 * n {
                aug.swap([i, j], [max_row, j]);
            }
        }

        let pivot = aug[[i, i]];
        if pivot.abs() < 1e-13 * scale {
            return Err(Error::Decomposition("matrix is singular or nearly singular".into()));
        }
        for j in 0..2 * n {
            aug[[i, j]] /= pivot;
        }
        for k in 0..n {
            if k != i {
                let factor = aug[[k, i]];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[[k, j]] -= factor * aug[[i, j]];
                    }
                }
            }
        }
    }

    Ok(aug.slice(ndarray::s![.., n..]).to_owned())
}
