//! External converter invocation.
//!
//! The converter is a separate executable (dcm2niix) that reads a directory of DICOM files
//! and writes NIfTI images plus a BIDS JSON sidecar. [`Converter`] is the seam between the
//! batch pass and the process launch so the pass can be exercised without the tool installed.

use crate::constants::{FLAG_BIDS_SIDECAR, FLAG_GZIP, FLAG_OUTPUT_DIR, FLAG_OUTPUT_STEM};
use crate::layout::ModalityTarget;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Arguments for one converter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Output filename stem (no extension), passed to `-f` unchanged
    pub stem: OsString,
    pub output_dir: PathBuf,
    pub input_dir: PathBuf,
    /// Emit a BIDS JSON sidecar next to the image
    pub bids_sidecar: bool,
    /// Compress the image (`.nii.gz`)
    pub gzip: bool,
}

impl ConversionRequest {
    /// Request for a discovered modality directory: input and output are the same directory.
    pub fn for_target(target: &ModalityTarget) -> Self {
        Self {
            stem: target.output_stem(),
            output_dir: target.dir.clone(),
            input_dir: target.dir.clone(),
            bids_sidecar: true,
            gzip: true,
        }
    }

    /// Command line arguments, in the order dcm2niix expects them.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            FLAG_BIDS_SIDECAR.into(),
            yes_no(self.bids_sidecar).into(),
            FLAG_GZIP.into(),
            yes_no(self.gzip).into(),
            FLAG_OUTPUT_STEM.into(),
            self.stem.clone(),
            FLAG_OUTPUT_DIR.into(),
            self.output_dir.clone().into_os_string(),
            self.input_dir.clone().into_os_string(),
        ]
    }

    /// Human-readable command line, for dry runs and log lines.
    pub fn command_line(&self, executable: &Path) -> String {
        std::iter::once(executable.as_os_str().to_owned())
            .chain(self.args())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "y"
    } else {
        "n"
    }
}

/// Result of one converter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The process ran to completion. `code` is `None` when it was terminated by a signal.
    Completed { code: Option<i32> },
    /// The process could not be started (missing executable, permissions, ...).
    LaunchFailed { reason: String },
}

impl ConversionOutcome {
    /// Whether the converter ran and exited with status zero.
    pub fn succeeded(&self) -> bool {
        matches!(self, ConversionOutcome::Completed { code: Some(0) })
    }
}

/// Runs one conversion.
///
/// Implementations report failures through the returned outcome and never panic; the batch
/// pass continues regardless of the outcome.
pub trait Converter {
    fn convert(&self, request: &ConversionRequest) -> ConversionOutcome;
}

/// The dcm2niix executable.
#[derive(Debug, Clone)]
pub struct Dcm2Niix {
    executable: PathBuf,
}

impl Dcm2Niix {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Converter for Dcm2Niix {
    /// Runs the executable and blocks until it exits.
    ///
    /// Standard output and error are inherited so the tool reports directly to the terminal.
    fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        match Command::new(&self.executable).args(request.args()).status() {
            Ok(status) => ConversionOutcome::Completed {
                code: status.code(),
            },
            Err(e) => ConversionOutcome::LaunchFailed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidsconv_types::{Modality, SessionId, SubjectId};

    fn target(subject: &str, session: &str, modality: Modality) -> ModalityTarget {
        ModalityTarget {
            subject: SubjectId::new(subject).unwrap(),
            session: SessionId::new(session).unwrap(),
            modality,
            dir: PathBuf::from("/data")
                .join(subject)
                .join(session)
                .join(modality.dir_name()),
        }
    }

    #[test]
    fn request_uses_modality_dir_for_input_and_output() {
        let request = ConversionRequest::for_target(&target("A", "1", Modality::Func));

        assert_eq!(request.stem, "A_1_task-rest_bold");
        assert_eq!(request.input_dir, PathBuf::from("/data/A/1/func"));
        assert_eq!(request.output_dir, request.input_dir);
        assert!(request.bids_sidecar);
        assert!(request.gzip);
    }

    #[test]
    fn args_follow_dcm2niix_order() {
        let request = ConversionRequest::for_target(&target("A", "1", Modality::Anat));
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-b",
                "y",
                "-z",
                "y",
                "-f",
                "A_1_T1w",
                "-o",
                "/data/A/1/anat",
                "/data/A/1/anat"
            ]
        );
    }

    #[test]
    fn command_line_prefixes_executable() {
        let request = ConversionRequest::for_target(&target("A", "1", Modality::Anat));
        assert_eq!(
            request.command_line(Path::new("dcm2niix")),
            "dcm2niix -b y -z y -f A_1_T1w -o /data/A/1/anat /data/A/1/anat"
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_stem_is_passed_to_the_converter_verbatim() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let subject = OsString::from_vec(b"sub\xe9".to_vec());
        let request = ConversionRequest::for_target(&ModalityTarget {
            subject: SubjectId::new(subject.clone()).unwrap(),
            session: SessionId::new("1").unwrap(),
            modality: Modality::Anat,
            dir: PathBuf::from("/data").join(&subject).join("1").join("anat"),
        });

        let args = request.args();
        assert_eq!(args[4], "-f");
        assert_eq!(args[5].as_bytes(), b"sub\xe9_1_T1w");
    }

    #[test]
    fn missing_executable_reports_launch_failure() {
        let converter = Dcm2Niix::new("/nonexistent/bidsconv-test/dcm2niix");
        let request = ConversionRequest::for_target(&target("A", "1", Modality::Anat));

        let outcome = converter.convert(&request);
        assert!(matches!(outcome, ConversionOutcome::LaunchFailed { .. }));
        assert!(!outcome.succeeded());
    }

    #[test]
    fn only_zero_exit_counts_as_success() {
        assert!(ConversionOutcome::Completed { code: Some(0) }.succeeded());
        assert!(!ConversionOutcome::Completed { code: Some(1) }.succeeded());
        assert!(!ConversionOutcome::Completed { code: None }.succeeded());
    }
}
