//! The conversion pass.
//!
//! Walks the data root and runs the converter once per discovered modality directory,
//! strictly in sequence. Converter failures are recorded and logged but never stop the pass,
//! and nothing is retried.

use crate::config::BatchConfig;
use crate::converter::{ConversionOutcome, ConversionRequest, Converter};
use crate::layout::{discover_targets, ModalityTarget};
use crate::BatchResult;

/// One converter run performed by [`run_conversion`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub target: ModalityTarget,
    pub request: ConversionRequest,
    pub outcome: ConversionOutcome,
}

/// Summary of a conversion pass.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Invocations in the order they were made
    pub invocations: Vec<Invocation>,
}

impl RunReport {
    pub fn invocation_count(&self) -> usize {
        self.invocations.len()
    }

    /// Runs that completed with a zero exit status.
    pub fn succeeded(&self) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.outcome.succeeded())
            .count()
    }

    /// Runs that completed with a non-zero status or were killed by a signal.
    pub fn nonzero_exits(&self) -> usize {
        self.invocations
            .iter()
            .filter(|i| matches!(i.outcome, ConversionOutcome::Completed { .. }))
            .filter(|i| !i.outcome.succeeded())
            .count()
    }

    /// Runs where the converter could not be started.
    pub fn launch_failures(&self) -> usize {
        self.invocations
            .iter()
            .filter(|i| matches!(i.outcome, ConversionOutcome::LaunchFailed { .. }))
            .count()
    }
}

/// Converts every `anat` and `func` directory under the configured data root.
///
/// Invocations happen in subject, session, then anat-before-func order.
///
/// # Errors
///
/// Only fails when the data root itself cannot be listed. Converter failures are reported
/// in the returned [`RunReport`].
pub fn run_conversion<C>(config: &BatchConfig, converter: &C) -> BatchResult<RunReport>
where
    C: Converter + ?Sized,
{
    let targets = discover_targets(config.data_root())?;
    tracing::info!(
        "found {} modality directories under {}",
        targets.len(),
        config.data_root().display()
    );

    let mut report = RunReport::default();

    for target in targets {
        let request = ConversionRequest::for_target(&target);
        tracing::info!(
            "converting {} -> {}",
            target.dir.display(),
            request.stem.to_string_lossy()
        );

        let outcome = converter.convert(&request);
        match &outcome {
            ConversionOutcome::Completed { code: Some(0) } => {}
            ConversionOutcome::Completed { code } => {
                tracing::warn!(
                    "converter exited with status {:?} for {}",
                    code,
                    target.dir.display()
                );
            }
            ConversionOutcome::LaunchFailed { reason } => {
                tracing::warn!(
                    "failed to launch {} for {}: {}",
                    config.converter().display(),
                    target.dir.display(),
                    reason
                );
            }
        }

        report.invocations.push(Invocation {
            target,
            request,
            outcome,
        });
    }

    Ok(report)
}

/// Lists the converter requests [`run_conversion`] would make, without running anything.
pub fn plan_conversion(config: &BatchConfig) -> BatchResult<Vec<ConversionRequest>> {
    Ok(discover_targets(config.data_root())?
        .iter()
        .map(ConversionRequest::for_target)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::OsString;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedConverter {
        calls: RefCell<Vec<OsString>>,
        fail_stem: Option<&'static str>,
    }

    impl Converter for ScriptedConverter {
        fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
            self.calls.borrow_mut().push(request.stem.clone());
            if self.fail_stem.is_some_and(|stem| request.stem == stem) {
                ConversionOutcome::LaunchFailed {
                    reason: "scripted failure".into(),
                }
            } else {
                ConversionOutcome::Completed { code: Some(0) }
            }
        }
    }

    fn config(root: PathBuf) -> BatchConfig {
        BatchConfig::new(root, PathBuf::from("dcm2niix")).expect("config should be valid")
    }

    #[test]
    fn session_with_both_modalities_converts_anat_then_func() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("S/1/anat")).unwrap();
        fs::create_dir_all(temp_dir.path().join("S/1/func")).unwrap();

        let converter = ScriptedConverter::default();
        let report = run_conversion(&config(temp_dir.path().to_path_buf()), &converter)
            .expect("pass should succeed");

        assert_eq!(report.invocation_count(), 2);
        assert_eq!(
            *converter.calls.borrow(),
            vec!["S_1_T1w", "S_1_task-rest_bold"]
        );
    }

    #[test]
    fn launch_failure_does_not_stop_the_pass() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("A/1/anat")).unwrap();
        fs::create_dir_all(temp_dir.path().join("B/1/anat")).unwrap();

        let converter = ScriptedConverter {
            fail_stem: Some("A_1_T1w"),
            ..ScriptedConverter::default()
        };
        let report = run_conversion(&config(temp_dir.path().to_path_buf()), &converter)
            .expect("pass should succeed");

        assert_eq!(converter.calls.borrow().len(), 2);
        assert_eq!(report.launch_failures(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.nonzero_exits(), 0);
    }

    #[test]
    fn plan_matches_run_without_invoking() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("A/1/func")).unwrap();

        let plan = plan_conversion(&config(temp_dir.path().to_path_buf()))
            .expect("plan should succeed");

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].stem, "A_1_task-rest_bold");
        assert_eq!(plan[0].input_dir, temp_dir.path().join("A/1/func"));
    }
}
