//! Session layout discovery.
//!
//! The data root is expected to follow a fixed two-level layout:
//!
//! ```text
//! <root>/
//! └── <subject>/
//!     └── <session>/
//!         ├── anat/    # T1-weighted DICOM series
//!         └── func/    # resting-state BOLD DICOM series
//! ```
//!
//! Subject and session names are used verbatim as identifiers, as raw [`OsString`]s. Entries
//! are visited in ascending name order, and within a session `anat` comes before `func`.

use crate::{BatchError, BatchResult};
use bidsconv_types::{Modality, SessionId, SubjectId};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// A modality directory found under a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalityTarget {
    pub subject: SubjectId,
    pub session: SessionId,
    pub modality: Modality,
    /// Full path of the modality directory; both converter input and output location.
    pub dir: PathBuf,
}

impl ModalityTarget {
    /// Converter output stem, `<subject>_<session>_<suffix>`.
    pub fn output_stem(&self) -> OsString {
        self.modality.output_stem(&self.subject, &self.session)
    }
}

/// Discovers every `anat` and `func` directory under `root`.
///
/// # Errors
///
/// Returns `BatchError::RootUnreadable` if `root` cannot be listed. Subject or session
/// directories that cannot be listed are skipped with a warning.
pub fn discover_targets(root: &Path) -> BatchResult<Vec<ModalityTarget>> {
    discover_targets_for(root, &Modality::ALL)
}

/// Discovers modality directories under `root`, restricted to `modalities`.
///
/// Within each session, targets follow the order of `modalities`.
pub fn discover_targets_for(
    root: &Path,
    modalities: &[Modality],
) -> BatchResult<Vec<ModalityTarget>> {
    let subjects = sorted_subdirs(root).map_err(|source| BatchError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut targets = Vec::new();

    for (subject_name, subject_dir) in subjects {
        let Ok(subject) = SubjectId::new(subject_name) else {
            continue;
        };

        let sessions = match sorted_subdirs(&subject_dir) {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("skipping unreadable subject {}: {}", subject_dir.display(), e);
                continue;
            }
        };

        for (session_name, session_dir) in sessions {
            let Ok(session) = SessionId::new(session_name) else {
                continue;
            };

            for &modality in modalities {
                let dir = session_dir.join(modality.dir_name());
                if !dir.is_dir() {
                    tracing::debug!("no {} directory in {}", modality, session_dir.display());
                    continue;
                }

                targets.push(ModalityTarget {
                    subject: subject.clone(),
                    session: session.clone(),
                    modality,
                    dir,
                });
            }
        }
    }

    Ok(targets)
}

/// Finds every directory of one modality, with or without a session level.
///
/// Besides `<subject>/<session>/<modality>`, a `<subject>/<modality>` directory is
/// included for subjects recorded without sessions. Directories come in subject order, then
/// in name order of the entry under the subject. This is for the sidecar pass only; the
/// conversion pass needs a session name for its output stem.
///
/// # Errors
///
/// Returns `BatchError::RootUnreadable` if `root` cannot be listed.
pub fn discover_modality_dirs(root: &Path, modality: Modality) -> BatchResult<Vec<PathBuf>> {
    let subjects = sorted_subdirs(root).map_err(|source| BatchError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut dirs = Vec::new();

    for (_, subject_dir) in subjects {
        let entries = match sorted_subdirs(&subject_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("skipping unreadable subject {}: {}", subject_dir.display(), e);
                continue;
            }
        };

        for (name, entry_dir) in entries {
            if name == modality.dir_name() {
                dirs.push(entry_dir);
                continue;
            }
            let dir = entry_dir.join(modality.dir_name());
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
    }

    Ok(dirs)
}

/// Lists the immediate subdirectories of `dir` as `(name, path)`, sorted by name.
///
/// Regular files are ignored. Symlinks to directories count as directories.
fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<(OsString, PathBuf)>> {
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        subdirs.push((entry.file_name(), path));
    }

    subdirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(subdirs)
}
