//! Amplitude-based rejection of data segments before fitting.
//!
//! Matches MNE's `_reject_data_segments`: the (already decimated) data is cut
//! into consecutive segments of `tstep` seconds; a segment is dropped when the
//! peak-to-peak amplitude of any channel exceeds the threshold for that
//! channel's type. A trailing partial segment is discarded. When no threshold
//! applies to the picked channel types the data passes through whole. Rejection only
//! shapes the statistics the decomposition is fitted on; the signal itself
//! is never modified.
use std::collections::BTreeMap;

use log::{debug, warn};
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signal::ChannelType;

/// Peak-to-peak thresholds per channel type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub thresholds: BTreeMap<ChannelType, f64>,
    /// Segment length in seconds.
    pub tstep: f64,
}

impl Default for Rejection {
    fn default() -> Self {
        Self { thresholds: BTreeMap::new(), tstep: 2.0 }
    }
}

impl Rejection {
    /// Single threshold for one channel type.
    pub fn new(ch_type: ChannelType, threshold: f64) -> Self {
        let mut r = Self::default();
        r.thresholds.insert(ch_type, threshold);
        r
    }

    pub fn with(mut self, ch_type: ChannelType, threshold: f64) -> Self {
        self.thresholds.insert(ch_type, threshold);
        self
    }
}

/// Keep only the segments of `data` ([P, N], decimated) that pass `rejection`.
///
/// Returns the concatenated clean segments and the `(first, last)` sample
/// ranges that were dropped.
pub fn reject_segments(
    data: ArrayView2<f64>,
    ch_types: &[ChannelType],
    rejection: &Rejection,
    sfreq: f64,
    decim: usize,
) -> Result<(Array2<f64>, Vec<(usize, usize)>)> {
    if !(sfreq.is_finite() && sfreq > 0.0) {
        return Err(Error::InvalidSamplingRate(sfreq));
    }
    let decim = decim.max(1);
    let step = (rejection.tstep * sfreq).ceil() as usize;
    let step = (step as f64 / decim as f64).ceil() as usize;
    let step = step.max(1);
    let n_times = data.ncols();

    let ignored: Vec<&ChannelType> = rejection
        .thresholds
        .keys()
        .filter(|t| !ch_types.contains(t))
        .collect();
    if !ignored.is_empty() {
        debug!("rejection thresholds for absent channel types ignored: {ignored:?}");
    }
    if ignored.len() == rejection.thresholds.len() {
        return Ok((data.to_owned(), Vec::new()));
    }

    let mut keep: Vec<(usize, usize)> = Vec::new();
    let mut dropped: Vec<(usize, usize)> = Vec::new();
    let mut first = 0;
    while first + step <= n_times {
        let last = first + step;
        let segment = data.slice(s![.., first..last]);
        if is_good(segment, ch_types, rejection) {
            keep.push((first, last));
        } else {
            dropped.push((first, last));
        }
        first = last;
    }

    let n_clean: usize = keep.iter().map(|(a, b)| b - a).sum();
    let all_zero = keep
        .iter()
        .all(|&(a, b)| data.slice(s![.., a..b]).iter().all(|&v| v == 0.0));
    if n_clean == 0 || all_zero {
        return Err(Error::NoCleanSegments);
    }

    let mut clean = Array2::zeros((data.nrows(), n_clean));
    let mut at = 0;
    for &(a, b) in &keep {
        clean
            .slice_mut(s![.., at..at + (b - a)])
            .assign(&data.slice(s![.., a..b]));
        at += b - a;
    }

    if !dropped.is_empty() {
        warn!(
            "rejected {} of {} segments before fitting",
            dropped.len(),
            dropped.len() + keep.len()
        );
    }
    Ok((clean, dropped))
}

fn is_good(segment: ArrayView2<f64>, ch_types: &[ChannelType], rejection: &Rejection) -> bool {
    segment
        .rows()
        .into_iter()
        .zip(ch_types.iter())
        .all(|(row, t)| match rejection.thresholds.get(t) {
            Some(&thresh) => {
                let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                hi - lo <= thresh
            }
            None => true,
        })
}
