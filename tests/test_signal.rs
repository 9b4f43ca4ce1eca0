mod common;
use bieg::io::RawRecording;
use bieg::{build_signal, ElectrodeTable, Error, FilterBand, Montage, RecordingSource};
use common::{max_abs_diff, mixture, test_montage, write_montage_file, SFREQ};
use ndarray::Array2;
use std::io::Write;

fn recording(data: Array2<f64>) -> RawRecording {
    RawRecording { data, path: "synthetic.txt".into(), source: RecordingSource::default() }
}

// ── Layout ────────────────────────────────────────────────────────────────────

#[test]
fn layout_drops_three_auxiliary_entries() {
    let montage = Montage::builtin("biosemi128").unwrap();
    let signal = build_signal(&recording(Array2::zeros((128, 64))), &montage, SFREQ, None, 1).unwrap();
    let layout = signal.layout();
    assert_eq!(layout.len(), montage.len() - 3);
    assert_eq!(layout.names()[0], "A1");
    assert_eq!(layout.names()[127], "D32");
    assert_eq!(layout.positions().dim(), (128, 2));
    for &v in layout.positions().iter() {
        assert!((0.0..=1.0).contains(&v), "position {v} outside the unit box");
    }
}

#[test]
fn row_count_must_match_montage() {
    let montage = Montage::builtin("biosemi128").unwrap();
    let err = build_signal(&recording(Array2::zeros((127, 10))), &montage, SFREQ, None, 1).unwrap_err();
    assert!(matches!(err, Error::MontageMismatch { expected: 128, found: 127 }));
}

#[test]
fn text_montage_matches_in_memory_montage() {
    let f = write_montage_file(7);
    let from_file = Montage::from_path(f.path()).unwrap();
    let in_memory = test_montage(7);
    assert_eq!(from_file.names(), in_memory.names());
    let rec = recording(Array2::zeros((7, 16)));
    let a = build_signal(&rec, &from_file, SFREQ, None, 1).unwrap();
    let b = build_signal(&rec, &in_memory, SFREQ, None, 1).unwrap();
    assert!(max_abs_diff(a.layout().positions(), b.layout().positions()) < 1e-12);
}

#[test]
fn coordinate_file_can_be_scaled_to_unit_box() {
    let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    for row in ["0 0 10", "10 0 0", "0 10 0", "-10 0 0", "0 -10 0"] {
        writeln!(f, "{row}").unwrap();
    }
    f.flush().unwrap();
    let names: Vec<String> = ["Cz", "T8", "Fpz", "T7", "Oz"].map(String::from).to_vec();
    let m = Montage::from_coords_path(f.path(), names, b' ', true).unwrap();
    assert_eq!(m.n_eeg(), 2);
    assert_eq!(m.positions().row(0).to_vec(), vec![0.5, 0.5, 1.0]);
    assert_eq!(m.positions().row(3).to_vec(), vec![0.0, 0.5, 0.0]);
}

// ── Filtering ─────────────────────────────────────────────────────────────────

#[test]
fn unfiltered_mode_passes_data_through() {
    let data = mixture(7, 500, 3);
    let montage = test_montage(7);
    let signal = build_signal(&recording(data.clone()), &montage, SFREQ, None, 2).unwrap();
    assert_eq!(signal.data(), &data);
    assert!(!signal.is_filtered());
}

#[test]
fn band_pass_removes_dc_and_records_band() {
    let data = mixture(7, 2048, 3).mapv(|v| v + 1e-4);
    let montage = test_montage(7);
    let band = FilterBand::new(1.0, 40.0);
    let signal = build_signal(&recording(data), &montage, SFREQ, Some(band), 2).unwrap();
    assert_eq!(signal.filter_band(), Some(band));
    // Mean of the middle two seconds is ~0 after high-passing at 1 Hz.
    for row in signal.data().rows() {
        let mid = row.slice(ndarray::s![768..1280]);
        let mean = mid.sum() / mid.len() as f64;
        assert!(mean.abs() < 1e-5, "residual DC {mean:.2e}");
    }
}

#[test]
fn filter_output_is_independent_of_n_jobs() {
    let data = mixture(7, 1000, 5);
    let montage = test_montage(7);
    let band = Some(FilterBand::default());
    let a = build_signal(&recording(data.clone()), &montage, SFREQ, band, 1).unwrap();
    let b = build_signal(&recording(data), &montage, SFREQ, band, 4).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn band_above_nyquist_is_rejected() {
    let montage = test_montage(7);
    let err = build_signal(
        &recording(Array2::zeros((7, 100))),
        &montage,
        SFREQ,
        Some(FilterBand::new(1.0, 200.0)),
        1,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter(_)));
}

#[test]
fn sampling_rate_must_be_positive_and_finite() {
    let montage = test_montage(7);
    for sfreq in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = build_signal(&recording(Array2::zeros((7, 100))), &montage, sfreq, None, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidSamplingRate(_)), "sfreq = {sfreq}");
    }
}

// ── Electrodes ────────────────────────────────────────────────────────────────

#[test]
fn custom_electrode_table_overrides_builtin() {
    let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(f, "Fz,Cz,Pz").unwrap();
    writeln!(f, "4,0,2").unwrap();
    f.flush().unwrap();
    let table = ElectrodeTable::from_path(f.path()).unwrap();
    assert_eq!(table.resolve_indices(&["Pz", "Fz"]).unwrap(), vec![2, 4]);
    assert!(matches!(table.resolve_indices(&["A1"]), Err(Error::UnknownElectrode(n)) if n == "A1"));
}
