//! Scaling helpers.
//!
//! `min_max_scale_columns`: matches `sklearn.preprocessing.MinMaxScaler`:
//!   every column mapped linearly onto `[0, 1]`; constant columns become 0.
//!
//! `center_rows_inplace`: per-row mean removal:
//!   `data[c, :] -= mean(data[c, :])`, returns the removed means.
use ndarray::{Array1, Array2, Axis};

/// Rescale each column of `data` to `[0, 1]` in place.
pub fn min_max_scale_columns(data: &mut Array2<f64>) {
    for mut col in data.columns_mut() {
        let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = hi - lo;
        if range > 0.0 {
            col.mapv_inplace(|v| (v - lo) / range);
        } else {
            col.fill(0.0);
        }
    }
}

/// Subtract each row's mean in place and return the means.
pub fn center_rows_inplace(data: &mut Array2<f64>) -> Array1<f64> {
    let means = data
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(data.nrows()));
    for (mut row, &m) in data.rows_mut().into_iter().zip(means.iter()) {
        row.mapv_inplace(|v| v - m);
    }
    means
}

/// Population standard deviation (ddof = 0) over every element.
pub fn global_std(data: &Array2<f64>) -> f64 {
    let n = data.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = data.sum() / n;
    let var = data.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}
