mod common;
use bieg::{
    decompose_and_clean, Error, FilterBand, Method, Montage, RecordingSource, Session,
    SessionConfig, SessionState,
};
use common::{max_abs_diff, mixture, test_montage, write_montage_file, write_text_recording};
use ndarray::Array2;
use std::io::Write;
use tempfile::NamedTempFile;

struct Fixture {
    data: Array2<f64>,
    recording: NamedTempFile,
    montage: NamedTempFile,
}

fn fixture() -> Fixture {
    let data = mixture(7, 1200, 17);
    let recording = write_text_recording(&data, '\t', ".txt");
    let montage = write_montage_file(7);
    Fixture { data, recording, montage }
}

fn config(fx: &Fixture) -> SessionConfig {
    SessionConfig {
        input: Some(fx.recording.path().to_path_buf()),
        montage_path: Some(fx.montage.path().to_path_buf()),
        filter: None,
        ..SessionConfig::default()
    }
}

// ── Transitions ───────────────────────────────────────────────────────────────

#[test]
fn explicit_transitions_walk_the_state_machine() {
    let fx = fixture();
    let mut session = Session::default();
    assert_eq!(session.state(), SessionState::Unconfigured);

    session.load(fx.recording.path(), &RecordingSource::default()).unwrap();
    assert_eq!(session.state(), SessionState::Loaded);
    assert_eq!(session.recording().unwrap().data, fx.data);

    session.build_signal(&test_montage(7), 256.0, None).unwrap();
    assert_eq!(session.state(), SessionState::SignalBuilt);

    session.fit_decomposition(None, Some(5), Method::FastIca, 23).unwrap();
    assert_eq!(session.state(), SessionState::Decomposed);
    assert_eq!(session.config().n_components, Some(5));

    session.exclude(&[0]).unwrap();
    assert_eq!(session.state(), SessionState::Cleaned);
}

#[test]
fn consumer_operations_drive_state_lazily() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    assert_eq!(session.state(), SessionState::Unconfigured);

    let maps = session.get_component_maps().unwrap().clone();
    assert_eq!(maps.dim(), (7, 7));
    assert_eq!(session.state(), SessionState::Decomposed);

    let sources = session.get_sources().unwrap();
    assert_eq!(sources.dim(), (7, 1200));
}

#[test]
fn time_series_does_not_need_a_fit() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    let ts = session.get_time_series(Some(&[6, 0][..])).unwrap();
    assert_eq!(session.state(), SessionState::SignalBuilt);
    assert_eq!(ts.row(0), fx.data.row(6));
    assert_eq!(ts.row(1), fx.data.row(0));
    assert_eq!(session.times().unwrap().len(), 1200);
}

#[test]
fn missing_input_is_reported() {
    let mut session = Session::default();
    assert!(matches!(session.get_component_maps(), Err(Error::NotConfigured(_))));
    assert_eq!(session.state(), SessionState::Unconfigured);
}

// ── Caching ───────────────────────────────────────────────────────────────────

#[test]
fn identical_fit_is_served_from_cache() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    let first = session.fit_decomposition(Some(vec![0, 1, 2, 3]), None, Method::FastIca, 23).unwrap().clone();
    session.exclude(&[1]).unwrap();

    // Same request: no refit, cleaned signal survives.
    let again = session.fit_decomposition(Some(vec![0, 1, 2, 3]), None, Method::FastIca, 23).unwrap();
    assert_eq!(again.unmixing(), first.unmixing());
    assert_eq!(session.state(), SessionState::Cleaned);

    // Different seed: refit drops the cleaned signal.
    session.fit_decomposition(Some(vec![0, 1, 2, 3]), None, Method::FastIca, 5).unwrap();
    assert_eq!(session.state(), SessionState::Decomposed);
    assert!(session.cleaned().is_none());
}

#[test]
fn setters_invalidate_downstream_state() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    session.exclude(&[0]).unwrap();

    session.set_method(Method::FastIca);
    assert_eq!(session.state(), SessionState::Cleaned, "unchanged value keeps state");

    session.set_n_components(Some(3));
    assert_eq!(session.state(), SessionState::SignalBuilt);
    assert!(session.fitted().is_none());
    assert_eq!(session.get_component_maps().unwrap().dim(), (7, 3));

    session.set_picks(Some(vec![1, 2, 3, 4]));
    assert_eq!(session.state(), SessionState::SignalBuilt);
    assert_eq!(session.get_component_maps().unwrap().dim(), (4, 3));

    session.set_filter(Some(FilterBand::new(1.0, 40.0)));
    assert_eq!(session.state(), SessionState::Loaded);
    assert!(session.signal().is_none());
    session.get_sources().unwrap();
    assert!(session.signal().unwrap().is_filtered());
}

// ── Failure atomicity ─────────────────────────────────────────────────────────

#[test]
fn failed_fit_keeps_previous_decomposition() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    let before = session.fit_decomposition(None, Some(4), Method::Infomax, 23).unwrap().clone();
    let config_before = session.config().clone();

    let err = session.fit_decomposition(None, Some(99), Method::FastIca, 1).unwrap_err();
    assert!(matches!(err, Error::InvalidComponentCount { requested: 99, n_picks: 7 }));
    assert_eq!(session.state(), SessionState::Decomposed);
    assert_eq!(session.config(), &config_before);
    assert_eq!(session.fitted().unwrap().unmixing(), before.unmixing());
    assert_eq!(session.fitted().unwrap().method(), "infomax");
}

#[test]
fn failed_exclude_keeps_signal_and_cleaned_result() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    let cleaned = session.exclude(&[2]).unwrap();

    let err = session.exclude(&[1, 40]).unwrap_err();
    assert!(matches!(err, Error::InvalidComponentIndex { index: 40, .. }));
    assert_eq!(session.state(), SessionState::Cleaned);
    assert_eq!(session.excluded(), &[2]);
    assert_eq!(session.cleaned().unwrap().data(), &cleaned);
    assert_eq!(session.signal().unwrap().data(), &fx.data);
}

// ── Cleaned time series ───────────────────────────────────────────────────────

#[test]
fn time_series_reflects_exclusion_and_reexclusion_starts_fresh() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    let a = session.exclude(&[0]).unwrap();
    assert_eq!(session.get_time_series(None).unwrap(), a);

    // Second exclusion starts from the uncleaned signal, not from `a`.
    let b = session.exclude(&[1]).unwrap();
    let direct = {
        let mut fresh = Session::new(config(&fx));
        fresh.exclude(&[1]).unwrap()
    };
    assert_eq!(b, direct);
    assert_eq!(session.get_time_series(Some(&[3][..])).unwrap().row(0), b.row(3));
}

// ── Reload ────────────────────────────────────────────────────────────────────

#[test]
fn reload_rereads_the_file() {
    let fx = fixture();
    let mut session = Session::new(config(&fx));
    session.exclude(&[0]).unwrap();

    let replacement = fx.data.mapv(|v| v * 2.0);
    let mut file = std::fs::File::create(fx.recording.path()).unwrap();
    for row in replacement.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", line.join("\t")).unwrap();
    }
    drop(file);

    session.reload().unwrap();
    assert_eq!(session.state(), SessionState::Loaded);
    assert!(session.fitted().is_none());
    let ts = session.get_time_series(None).unwrap();
    assert!(max_abs_diff(&ts, &replacement) == 0.0);
}

#[test]
fn reload_without_input_fails_cleanly() {
    let mut session = Session::default();
    assert!(matches!(session.reload(), Err(Error::NotConfigured(_))));
}

// ── Montages ──────────────────────────────────────────────────────────────────

#[test]
fn builtin_montage_must_match_recording() {
    let fx = fixture();
    let cfg = SessionConfig { montage_path: None, ..config(&fx) };
    let mut session = Session::new(cfg);
    let err = session.get_time_series(None).unwrap_err();
    assert!(matches!(err, Error::MontageMismatch { expected: 128, found: 7 }));
    assert_eq!(session.state(), SessionState::Loaded);

    let err = session.build_signal(&test_montage(6), 256.0, None).unwrap_err();
    assert!(matches!(err, Error::MontageMismatch { expected: 6, found: 7 }));
    assert!(matches!(Montage::builtin("biosemi7"), Err(Error::UnknownMontage(_))));
}

// ── One-shot pipeline ─────────────────────────────────────────────────────────

#[test]
fn one_shot_pipeline_matches_session() {
    let fx = fixture();
    let cfg = config(&fx);
    let one_shot = decompose_and_clean(&cfg, &[0, 6]).unwrap();
    let mut session = Session::new(cfg);
    assert_eq!(session.exclude(&[0, 6]).unwrap(), one_shot);
}
