mod common;
use bieg::{load_recording, Error, RecordingSource};
use common::{mixture, write_text_recording};
use ndarray::{array, Array2};
use std::io::Write;

// ── MAT v5 fixture ────────────────────────────────────────────────────────────

/// Minimal uncompressed Level 5 MAT file holding one double matrix.
fn write_mat(var: &str, data: &Array2<f64>) -> tempfile::NamedTempFile {
    fn tag(out: &mut Vec<u8>, ty: u32, len: u32) {
        out.extend_from_slice(&ty.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
    }
    fn pad8(out: &mut Vec<u8>) {
        while out.len() % 8 != 0 {
            out.push(0);
        }
    }

    let (rows, cols) = data.dim();
    let mut body = Vec::new();
    // Array flags: mxDOUBLE_CLASS.
    tag(&mut body, 6, 8);
    body.extend_from_slice(&6u32.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    // Dimensions.
    tag(&mut body, 5, 8);
    body.extend_from_slice(&(rows as i32).to_le_bytes());
    body.extend_from_slice(&(cols as i32).to_le_bytes());
    // Name.
    tag(&mut body, 1, var.len() as u32);
    body.extend_from_slice(var.as_bytes());
    pad8(&mut body);
    // Real part, column-major.
    tag(&mut body, 9, (rows * cols * 8) as u32);
    for c in 0..cols {
        for r in 0..rows {
            body.extend_from_slice(&data[[r, c]].to_le_bytes());
        }
    }

    let mut file = Vec::new();
    let mut header = b"MATLAB 5.0 MAT-file, created by bieg tests".to_vec();
    header.resize(116, b' ');
    file.extend_from_slice(&header);
    file.extend_from_slice(&[0u8; 8]);
    file.extend_from_slice(&0x0100u16.to_le_bytes());
    file.extend_from_slice(b"IM");
    tag(&mut file, 14, body.len() as u32);
    file.extend_from_slice(&body);

    let mut f = tempfile::Builder::new().suffix(".mat").tempfile().unwrap();
    f.write_all(&file).unwrap();
    f.flush().unwrap();
    f
}

// ── MATLAB archives ───────────────────────────────────────────────────────────

#[test]
fn mat_variable_keeps_row_major_orientation() {
    let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let f = write_mat("EEGdata", &data);
    let rec = load_recording(f.path(), &RecordingSource::default()).unwrap();
    assert_eq!(rec.data, data);
    assert_eq!(rec.n_channels(), 2);
    assert_eq!(rec.n_times(), 3);
}

#[test]
fn mat_variable_name_is_configurable() {
    let data = array![[0.5, -0.5]];
    let f = write_mat("X", &data);
    let rec = load_recording(f.path(), &RecordingSource::with_variable("X")).unwrap();
    assert_eq!(rec.data, data);
}

#[test]
fn missing_mat_variable() {
    let f = write_mat("other", &array![[1.0]]);
    let err = load_recording(f.path(), &RecordingSource::default()).unwrap_err();
    assert!(matches!(err, Error::MissingVariable { ref name, .. } if name == "EEGdata"));
}

// ── Delimited text ────────────────────────────────────────────────────────────

#[test]
fn tab_separated_text_round_trips_values() {
    let data = mixture(4, 50, 1);
    let f = write_text_recording(&data, '\t', ".txt");
    let rec = load_recording(f.path(), &RecordingSource::default()).unwrap();
    assert_eq!(rec.data, data);
    assert_eq!(rec.path, f.path());
}

#[test]
fn separator_is_configurable() {
    let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.5]];
    let f = write_text_recording(&data, ',', ".csv");
    let rec = load_recording(f.path(), &RecordingSource::with_separator(b',')).unwrap();
    assert_eq!(rec.data, data);
}

#[test]
fn comments_and_padding_are_ignored() {
    let mut f = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
    writeln!(f, "# exported channels").unwrap();
    writeln!(f, " 1.0\t2.0 ").unwrap();
    writeln!(f, "3.0\t 4.0").unwrap();
    f.flush().unwrap();
    let rec = load_recording(f.path(), &RecordingSource::default()).unwrap();
    assert_eq!(rec.data, array![[1.0, 2.0], [3.0, 4.0]]);
}

#[test]
fn ragged_rows_name_the_line() {
    let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(f, "1\t2\t3").unwrap();
    writeln!(f, "4\t5").unwrap();
    f.flush().unwrap();
    match load_recording(f.path(), &RecordingSource::default()) {
        Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn non_numeric_token_is_a_parse_error() {
    let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(f, "1\tabc").unwrap();
    f.flush().unwrap();
    assert!(matches!(
        load_recording(f.path(), &RecordingSource::default()),
        Err(Error::Parse { line: 1, .. })
    ));
}

#[test]
fn unknown_extension_is_rejected() {
    let f = tempfile::Builder::new().suffix(".edf").tempfile().unwrap();
    assert!(matches!(
        load_recording(f.path(), &RecordingSource::default()),
        Err(Error::UnsupportedFormat { .. })
    ));
}
