//! # bidsconv Core
//!
//! Batch conversion of DICOM session data into NIfTI for a fixed subject/session layout.
//!
//! This crate contains the filesystem and process logic:
//! - Discovery of `<root>/<subject>/<session>/{anat,func}` directories
//! - One dcm2niix run per discovered directory, in a deterministic order
//! - Enrichment of functional sidecars from Philips PAR headers
//!
//! **No process-wide state**: environment variables and logging setup belong in the binaries;
//! everything here takes a resolved [`BatchConfig`].

pub mod batch;
pub mod config;
pub mod constants;
mod error;
pub mod converter;
pub mod layout;
pub mod sidecar;

pub use batch::{plan_conversion, run_conversion, Invocation, RunReport};
pub use config::{converter_from_env_value, data_root_from_env_value, BatchConfig};
pub use converter::{ConversionOutcome, ConversionRequest, Converter, Dcm2Niix};
pub use error::{BatchError, BatchResult};
pub use layout::{
    discover_modality_dirs, discover_targets, discover_targets_for, ModalityTarget,
};
pub use sidecar::{
    enrich_sidecar, find_par_json_pairs, run_sidecar_updates, update_sidecar, SidecarChanges,
    SidecarFailure, SidecarOptions, SidecarReport, SidecarUpdate,
};

pub use bidsconv_types::{Modality, SessionId, SubjectId};
