//! End-to-end tests of the conversion and sidecar passes over fixture directory trees.

use bidsconv_core::{
    run_conversion, run_sidecar_updates, BatchConfig, ConversionOutcome, ConversionRequest,
    Converter, SidecarOptions,
};
use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingConverter {
    requests: RefCell<Vec<ConversionRequest>>,
}

impl RecordingConverter {
    fn stems(&self) -> Vec<OsString> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.stem.clone())
            .collect()
    }
}

impl Converter for RecordingConverter {
    fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        self.requests.borrow_mut().push(request.clone());
        ConversionOutcome::Completed { code: Some(0) }
    }
}

fn layout(dirs: &[&str]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for dir in dirs {
        fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create fixture dir");
    }
    temp_dir
}

fn config(root: &Path) -> BatchConfig {
    BatchConfig::new(root.to_path_buf(), PathBuf::from("dcm2niix"))
        .expect("config should be valid")
}

#[test]
fn one_anat_among_two_subjects_gives_one_invocation() {
    let root = layout(&["A/1/anat", "B/1"]);
    let converter = RecordingConverter::default();

    let report = run_conversion(&config(root.path()), &converter).expect("pass should succeed");

    assert_eq!(report.invocation_count(), 1);
    assert_eq!(converter.stems(), vec!["A_1_T1w"]);

    let request = &converter.requests.borrow()[0];
    let anat = root.path().join("A").join("1").join("anat");
    assert_eq!(request.input_dir, anat);
    assert_eq!(request.output_dir, anat);
}

#[test]
fn session_with_neither_modality_gives_no_invocations() {
    let root = layout(&["A/1/dwi", "A/2"]);
    let converter = RecordingConverter::default();

    let report = run_conversion(&config(root.path()), &converter).expect("pass should succeed");

    assert_eq!(report.invocation_count(), 0);
    assert!(converter.stems().is_empty());
}

#[test]
fn directory_names_are_not_sanitised() {
    let root = layout(&["sub 01.x/ses-pre op/anat", "sub 01.x/ses-pre op/func"]);
    let converter = RecordingConverter::default();

    run_conversion(&config(root.path()), &converter).expect("pass should succeed");

    assert_eq!(
        converter.stems(),
        vec![
            "sub 01.x_ses-pre op_T1w",
            "sub 01.x_ses-pre op_task-rest_bold"
        ]
    );
}

#[test]
fn traversal_is_subject_then_session_then_modality() {
    let root = layout(&["B/2/anat", "A/2/func", "A/1/func", "A/1/anat", "B/1/func"]);
    let converter = RecordingConverter::default();

    run_conversion(&config(root.path()), &converter).expect("pass should succeed");

    assert_eq!(
        converter.stems(),
        vec![
            "A_1_T1w",
            "A_1_task-rest_bold",
            "A_2_task-rest_bold",
            "B_1_task-rest_bold",
            "B_2_T1w",
        ]
    );
}

#[test]
fn sidecar_pass_enriches_func_sidecars_only() {
    let root = layout(&["A/1/anat", "A/1/func", "B/1/func"]);
    let func = root.path().join("A").join("1").join("func");

    fs::write(
        func.join("rest.PAR"),
        "# CLINICAL TRYOUT             Research image export tool     V4.2\n\
         .    Protocol name                      :   fMRI rest\n\
         .    Max. number of slices/locations    :   4\n\
         .    Repetition time [ms]               :   2000.000\n\
         .    Preparation direction              :   Anterior-Posterior\n",
    )
    .unwrap();
    fs::write(func.join("A_1_task-rest_bold.json"), r#"{"Modality": "MR"}"#).unwrap();
    fs::write(
        root.path().join("A/1/anat/A_1_T1w.json"),
        r#"{"Modality": "MR"}"#,
    )
    .unwrap();

    let report = run_sidecar_updates(
        &config(root.path()),
        SidecarOptions {
            create_backup: false,
        },
    )
    .expect("pass should succeed");

    assert_eq!(report.func_dirs, 2);
    assert_eq!(report.dirs_without_pairs, 1);
    assert_eq!(report.updates.len(), 1);
    assert!(report.failures.is_empty());

    let written: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(func.join("A_1_task-rest_bold.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written["RepetitionTime"], 2.0);
    assert_eq!(written["SliceTiming"], serde_json::json!([0.0, 1.0, 0.5, 1.5]));
    assert_eq!(written["PhaseEncodingDirection"], "j-");
    assert_eq!(written["TaskName"], "rest");

    let anat: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(root.path().join("A/1/anat/A_1_T1w.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(anat, serde_json::json!({"Modality": "MR"}));
}

#[test]
fn unparsable_par_is_reported_and_sidecar_left_untouched() {
    let root = layout(&["A/1/func"]);
    let func = root.path().join("A").join("1").join("func");
    fs::write(func.join("scan.par"), "not a header\n").unwrap();
    fs::write(func.join("bold.json"), "{}").unwrap();

    let report = run_sidecar_updates(&config(root.path()), SidecarOptions::default())
        .expect("pass should succeed");

    assert_eq!(report.pairs(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(fs::read_to_string(func.join("bold.json")).unwrap(), "{}");
}

#[test]
fn sidecar_pass_visits_sessionless_func_dirs() {
    let root = layout(&["A/func", "B/ses-1/func"]);
    for func in [root.path().join("A/func"), root.path().join("B/ses-1/func")] {
        fs::write(
            func.join("rest.PAR"),
            ".    Protocol name                      :   fMRI rest\n\
             .    Repetition time [ms]               :   2500.000\n",
        )
        .unwrap();
        fs::write(func.join("task-rest_bold.json"), "{}").unwrap();
    }

    let report = run_sidecar_updates(
        &config(root.path()),
        SidecarOptions {
            create_backup: false,
        },
    )
    .expect("pass should succeed");

    assert_eq!(report.func_dirs, 2);
    assert_eq!(report.updates.len(), 2);
    assert_eq!(report.updates[0].json, root.path().join("A/func/task-rest_bold.json"));

    let written: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(root.path().join("A/func/task-rest_bold.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written["RepetitionTime"], 2.5);
    assert_eq!(written["ProtocolName"], "fMRI rest");
}
