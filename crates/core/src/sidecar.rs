//! Sidecar enrichment from Philips PAR headers.
//!
//! dcm2niix cannot recover every acquisition parameter from Philips exports, so the
//! functional sidecars it writes often lack `SliceTiming`, `PhaseEncodingDirection` or
//! `EffectiveEchoSpacing`. When the original `.PAR` header sits in the same `func`
//! directory, this pass reads it and merges the derived fields into the sidecar JSON.
//!
//! # Pairing
//!
//! Within a `func` directory, sidecars whose stem mentions `rest`, `bold`, `task` or `func`
//! are paired with the first PAR file whose stem does too, falling back to the first PAR
//! file. If nothing pairs that way but both kinds of file exist, the first PAR is paired
//! with the first sidecar. Hidden files and backups are never treated as sidecars.
//!
//! # Writes
//!
//! The sidecar is backed up to `<sidecar>.backup_<YYYYmmdd_HHMMSS>` before it is rewritten
//! (unless disabled). Existing keys keep their position; new keys are appended.

use crate::config::BatchConfig;
use crate::constants::{BACKUP_INFIX, BACKUP_TIMESTAMP_FORMAT, PROCESSING_INFO_KEY};
use crate::layout::discover_modality_dirs;
use crate::{BatchError, BatchResult};
use bidsconv_par::{extract_bids_params, BidsParams, ParHeader};
use bidsconv_types::Modality;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const TASK_HINTS: [&str; 4] = ["rest", "bold", "task", "func"];

/// Options for sidecar updates.
#[derive(Debug, Clone, Copy)]
pub struct SidecarOptions {
    /// Copy the sidecar aside before rewriting it
    pub create_backup: bool,
}

impl Default for SidecarOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
        }
    }
}

/// Changes made to one sidecar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarChanges {
    /// Fields that were not present before
    pub added: Vec<String>,
    /// Fields whose value changed
    pub updated: Vec<String>,
    pub backup: Option<PathBuf>,
}

/// Outcome of a successful PAR/sidecar update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarUpdate {
    pub par: PathBuf,
    pub json: PathBuf,
    pub changes: SidecarChanges,
}

/// A PAR/sidecar pair that could not be processed.
#[derive(Debug, Clone)]
pub struct SidecarFailure {
    pub par: PathBuf,
    pub json: PathBuf,
    pub reason: String,
}

/// Summary of a sidecar enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct SidecarReport {
    /// `func` directories inspected
    pub func_dirs: usize,
    /// `func` directories with no PAR/sidecar pair
    pub dirs_without_pairs: usize,
    pub updates: Vec<SidecarUpdate>,
    pub failures: Vec<SidecarFailure>,
}

impl SidecarReport {
    pub fn pairs(&self) -> usize {
        self.updates.len() + self.failures.len()
    }
}

/// Enriches every functional sidecar under the configured data root.
///
/// Both `<subject>/<session>/func` and sessionless `<subject>/func` directories are visited.
///
/// # Errors
///
/// Only fails when the data root itself cannot be listed. Per-directory and per-pair
/// failures are logged and recorded in the returned report.
pub fn run_sidecar_updates(
    config: &BatchConfig,
    options: SidecarOptions,
) -> BatchResult<SidecarReport> {
    let func_dirs = discover_modality_dirs(config.data_root(), Modality::Func)?;
    let mut report = SidecarReport::default();

    for func_dir in func_dirs {
        report.func_dirs += 1;

        let pairs = match find_par_json_pairs(&func_dir) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::warn!("{}", e);
                report.dirs_without_pairs += 1;
                continue;
            }
        };

        if pairs.is_empty() {
            tracing::info!("no PAR/JSON pairs in {}", func_dir.display());
            report.dirs_without_pairs += 1;
            continue;
        }

        for (par, json) in pairs {
            match enrich_sidecar(&par, &json, options) {
                Ok(update) => {
                    tracing::info!(
                        "updated {} from {} (+{}, ~{})",
                        json.display(),
                        par.display(),
                        update.changes.added.len(),
                        update.changes.updated.len()
                    );
                    report.updates.push(update);
                }
                Err(e) => {
                    tracing::warn!("failed to update {}: {}", json.display(), e);
                    report.failures.push(SidecarFailure {
                        par,
                        json,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(report)
}

/// Reads `par`, derives BIDS parameters and merges them into `json`.
pub fn enrich_sidecar(
    par: &Path,
    json: &Path,
    options: SidecarOptions,
) -> BatchResult<SidecarUpdate> {
    let bytes = fs::read(par).map_err(BatchError::ParRead)?;
    let header = ParHeader::parse_bytes(&bytes)?;
    let params = extract_bids_params(&header);
    tracing::debug!(
        "extracted {} fields from {} ({})",
        params.field_count(),
        par.display(),
        params.par_version.as_deref().unwrap_or("unknown version")
    );

    let changes = update_sidecar(json, &params, options, Utc::now())?;
    Ok(SidecarUpdate {
        par: par.to_path_buf(),
        json: json.to_path_buf(),
        changes,
    })
}

/// Merges `params` into the sidecar at `json_path` and rewrites it.
///
/// Equal values are left alone, so re-running on an enriched sidecar reports no updates.
/// A `_BIDSProcessingInfo` object recording what changed is written on every run.
pub fn update_sidecar(
    json_path: &Path,
    params: &BidsParams,
    options: SidecarOptions,
    now: DateTime<Utc>,
) -> BatchResult<SidecarChanges> {
    let contents = fs::read_to_string(json_path).map_err(BatchError::SidecarRead)?;
    let mut sidecar = match serde_json::from_str::<Value>(&contents)
        .map_err(BatchError::SidecarParse)?
    {
        Value::Object(map) => map,
        _ => return Err(BatchError::SidecarNotObject(json_path.to_path_buf())),
    };

    let fields = match serde_json::to_value(params).map_err(BatchError::SidecarSerialization)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let (added, updated) = merge_fields(&mut sidecar, fields);

    sidecar.insert(
        PROCESSING_INFO_KEY.to_owned(),
        json!({
            "ProcessingTool": "bidsconv",
            "ToolVersion": env!("CARGO_PKG_VERSION"),
            "ProcessingDateTime": now.to_rfc3339(),
            "Source": "Philips PAR header",
            "PAR_Version": params.par_version.as_deref().unwrap_or("unknown"),
            "SliceTimingMethod": params
                .slice_timing
                .as_ref()
                .map(|_| "interleaved_ascending_from_bottom"),
            "FieldsAdded": added,
            "FieldsUpdated": updated,
        }),
    );

    let backup = if options.create_backup {
        let backup = backup_path(json_path, now);
        fs::copy(json_path, &backup).map_err(BatchError::Backup)?;
        Some(backup)
    } else {
        None
    };

    let mut out = serde_json::to_string_pretty(&Value::Object(sidecar))
        .map_err(BatchError::SidecarSerialization)?;
    out.push('\n');
    fs::write(json_path, out).map_err(BatchError::SidecarWrite)?;

    Ok(SidecarChanges {
        added,
        updated,
        backup,
    })
}

/// Backup location for a sidecar rewritten at `now`.
pub fn backup_path(json_path: &Path, now: DateTime<Utc>) -> PathBuf {
    let mut name = json_path.as_os_str().to_owned();
    name.push(BACKUP_INFIX);
    name.push(now.format(BACKUP_TIMESTAMP_FORMAT).to_string());
    PathBuf::from(name)
}

fn merge_fields(
    sidecar: &mut Map<String, Value>,
    fields: Map<String, Value>,
) -> (Vec<String>, Vec<String>) {
    let mut added = Vec::new();
    let mut updated = Vec::new();

    for (key, value) in fields {
        match sidecar.get_mut(&key) {
            Some(existing) if same_value(existing, &value) => {}
            Some(existing) => {
                *existing = value;
                updated.push(key);
            }
            None => {
                sidecar.insert(key.clone(), value);
                added.push(key);
            }
        }
    }

    (added, updated)
}

// Integer and float JSON numbers compare unequal in serde_json; `2` and `2.0` are the same
// field value here.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        _ => a == b,
    }
}

/// Finds PAR/sidecar pairs in a `func` directory.
///
/// # Errors
///
/// Returns `BatchError::ModalityDirUnreadable` if the directory cannot be listed.
pub fn find_par_json_pairs(func_dir: &Path) -> BatchResult<Vec<(PathBuf, PathBuf)>> {
    let unreadable = |source| BatchError::ModalityDirUnreadable {
        path: func_dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(func_dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let par_files: Vec<&PathBuf> = files.iter().filter(|p| has_extension(p, "par")).collect();
    let json_files: Vec<&PathBuf> = files.iter().filter(|p| is_sidecar(p)).collect();

    let (Some(first_par), Some(first_json)) = (par_files.first(), json_files.first()) else {
        return Ok(Vec::new());
    };

    let mut pairs = Vec::new();
    for json in &json_files {
        if !mentions_task(json) {
            continue;
        }
        let par = par_files
            .iter()
            .find(|par| mentions_task(par))
            .unwrap_or(first_par);
        pairs.push(((*par).clone(), (*json).clone()));
    }

    if pairs.is_empty() {
        pairs.push(((*first_par).clone(), (*first_json).clone()));
    }

    Ok(pairs)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_sidecar(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    has_extension(path, "json")
        && !name.starts_with('.')
        && !name.to_lowercase().contains("backup")
}

fn mentions_task(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .is_some_and(|stem| TASK_HINTS.iter().any(|hint| stem.contains(hint)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "{}").expect("Failed to write fixture file");
        path
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 14, 19, 55).unwrap()
    }

    #[test]
    fn pairs_task_sidecar_with_task_par() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path();
        touch(dir, "a_survey.PAR");
        let par = touch(dir, "fmri_rest.PAR");
        let json = touch(dir, "sub_1_task-rest_bold.json");
        touch(dir, "sub_1_task-rest_bold.json.backup_20250101_000000");
        touch(dir, ".hidden_bold.json");

        let pairs = find_par_json_pairs(dir).expect("pairing should succeed");
        assert_eq!(pairs, vec![(par, json)]);
    }

    #[test]
    fn falls_back_to_first_files_when_nothing_mentions_a_task() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path();
        let par = touch(dir, "a.par");
        touch(dir, "b.par");
        let json = touch(dir, "scan.json");

        let pairs = find_par_json_pairs(dir).expect("pairing should succeed");
        assert_eq!(pairs, vec![(par, json)]);
    }

    #[test]
    fn no_par_means_no_pairs() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        touch(temp_dir.path(), "sub_1_task-rest_bold.json");

        assert!(find_par_json_pairs(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn update_merges_fields_and_records_processing_info() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let json_path = temp_dir.path().join("bold.json");
        fs::write(
            &json_path,
            r#"{"Modality": "MR", "RepetitionTime": 2, "EchoTime": 0.035}"#,
        )
        .unwrap();

        let params = BidsParams {
            repetition_time: Some(2.0),
            echo_time: Some(0.03),
            phase_encoding_direction: Some("j-".into()),
            par_version: Some("V4.2".into()),
            ..BidsParams::default()
        };

        let update =
            update_sidecar(&json_path, &params, SidecarOptions::default(), fixed_now())
                .expect("update should succeed");

        assert_eq!(update.added, vec!["PhaseEncodingDirection".to_string()]);
        assert_eq!(update.updated, vec!["EchoTime".to_string()]);

        let backup = update.backup.expect("backup should be created");
        assert!(backup
            .to_string_lossy()
            .ends_with("bold.json.backup_20250910_141955"));
        let original: Value =
            serde_json::from_str(&fs::read_to_string(&backup).unwrap()).unwrap();
        assert_eq!(original["EchoTime"], 0.035);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        let keys: Vec<&String> = written.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec![
                "Modality",
                "RepetitionTime",
                "EchoTime",
                "PhaseEncodingDirection",
                PROCESSING_INFO_KEY
            ]
        );
        assert_eq!(written["EchoTime"], 0.03);
        assert_eq!(written[PROCESSING_INFO_KEY]["PAR_Version"], "V4.2");
        assert_eq!(
            written[PROCESSING_INFO_KEY]["FieldsAdded"],
            json!(["PhaseEncodingDirection"])
        );
    }

    #[test]
    fn update_without_backup_leaves_no_copy() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let json_path = touch(temp_dir.path(), "bold.json");

        let update = update_sidecar(
            &json_path,
            &BidsParams::default(),
            SidecarOptions {
                create_backup: false,
            },
            fixed_now(),
        )
        .expect("update should succeed");

        assert!(update.backup.is_none());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn non_object_sidecar_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let json_path = temp_dir.path().join("bold.json");
        fs::write(&json_path, "[1, 2, 3]").unwrap();

        let err = update_sidecar(
            &json_path,
            &BidsParams::default(),
            SidecarOptions::default(),
            fixed_now(),
        )
        .expect_err("array sidecar must be rejected");
        assert!(matches!(err, BatchError::SidecarNotObject(_)));
        assert_eq!(fs::read_to_string(&json_path).unwrap(), "[1, 2, 3]");
    }

    #[test]
    fn integer_and_float_numbers_compare_equal() {
        assert!(same_value(&json!(2), &json!(2.0)));
        assert!(same_value(&json!([0, 1.0]), &json!([0.0, 1])));
        assert!(!same_value(&json!("2"), &json!(2)));
    }
}
