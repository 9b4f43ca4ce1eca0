use bieg::filter::{
    apply_fir_zero_phase, auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high,
    design_bandpass, filter_1d, FilterBand,
};
use bieg::Error;
use ndarray::Array2;

const SFREQ: f64 = 256.0;

fn sine(freq: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / SFREQ).sin())
        .collect()
}

fn interior_rms(x: &[f64], guard: usize) -> f64 {
    let interior = &x[guard..x.len() - guard];
    (interior.iter().map(|v| v * v).sum::<f64>() / interior.len() as f64).sqrt()
}

// ── Coefficient tests ─────────────────────────────────────────────────────────

#[test]
fn bandpass_length_follows_mne_defaults() {
    // 1–40 Hz at 256 Hz: l_tb = 1 Hz, h_tb = 10 Hz → ⌈3.3 / 1 · 256⌉ → 845 taps.
    assert_eq!(auto_trans_bandwidth(1.0), 1.0);
    assert_eq!(auto_trans_bandwidth_high(40.0, SFREQ), 10.0);
    assert_eq!(auto_filter_length(1.0, SFREQ), 845);
    let h = design_bandpass(FilterBand::default(), SFREQ).unwrap();
    assert_eq!(h.len(), 845);
}

#[test]
fn bandpass_coeffs_sum_near_zero() {
    // Band-pass: zero DC gain.
    let h = design_bandpass(FilterBand::default(), SFREQ).unwrap();
    let s: f64 = h.iter().sum();
    assert!(s.abs() < 1e-3, "sum(h) = {s:.2e}, expected ≈ 0 for band-pass");
}

#[test]
fn bandpass_coeffs_symmetric() {
    let h = design_bandpass(FilterBand::new(2.0, 30.0), SFREQ).unwrap();
    let n = h.len();
    assert_eq!(n % 2, 1);
    for i in 0..n / 2 {
        assert!((h[i] - h[n - 1 - i]).abs() < 1e-15, "h[{i}] ≠ h[{}]", n - 1 - i);
    }
}

#[test]
fn invalid_bands_are_rejected() {
    for band in [FilterBand::new(0.0, 40.0), FilterBand::new(40.0, 1.0), FilterBand::new(1.0, 128.0)] {
        assert!(matches!(design_bandpass(band, SFREQ), Err(Error::InvalidFilter(_))), "{band:?}");
    }
}

// ── Application tests ─────────────────────────────────────────────────────────

#[test]
fn passband_sine_is_preserved() {
    let h = design_bandpass(FilterBand::default(), SFREQ).unwrap();
    let x = sine(10.0, 20 * 256);
    let y = filter_1d(&x, &h);
    assert_eq!(y.len(), x.len());
    let guard = h.len();
    for i in guard..x.len() - guard {
        assert!((y[i] - x[i]).abs() < 0.01, "sample {i}: {} vs {}", y[i], x[i]);
    }
}

#[test]
fn stopband_content_is_removed() {
    // DC offset and 60 Hz (stop band) + 10 Hz (pass band).
    let n = 60 * 256;
    let fast = sine(60.0, n);
    let mid = sine(10.0, n);
    let row: Vec<f64> = (0..n).map(|i| 1.0 + fast[i] + mid[i]).collect();
    let mut data = Array2::from_shape_vec((1, n), row).unwrap();
    let h = design_bandpass(FilterBand::default(), SFREQ).unwrap();
    apply_fir_zero_phase(&mut data, &h, 1).unwrap();

    let filtered = data.row(0).to_vec();
    let rms = interior_rms(&filtered, h.len());
    // Pure 10 Hz sine has RMS = 1/√2 ≈ 0.707.
    assert!(rms > 0.68, "RMS too low ({rms:.3}), pass-band signal attenuated?");
    assert!(rms < 0.74, "RMS too high ({rms:.3}), stop-band not attenuated?");
}

#[test]
fn zero_phase_keeps_peaks_aligned() {
    let h = design_bandpass(FilterBand::default(), SFREQ).unwrap();
    let x = sine(8.0, 16 * 256);
    let y = filter_1d(&x, &h);
    // Interior peak of the input stays at the same sample.
    let window = 4096 / 2..4096 / 2 + 32;
    let argmax = |v: &[f64]| {
        window
            .clone()
            .max_by(|&a, &b| v[a].total_cmp(&v[b]))
            .unwrap()
    };
    assert_eq!(argmax(&x[..]), argmax(&y[..]));
}

#[test]
fn even_kernel_is_rejected() {
    let mut data = Array2::<f64>::zeros((2, 100));
    assert!(matches!(
        apply_fir_zero_phase(&mut data, &[0.5, 0.5], 1),
        Err(Error::InvalidFilter(_))
    ));
}
