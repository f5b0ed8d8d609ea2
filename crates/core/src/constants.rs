//! Constants used throughout the bidsconv core crate.
//!
//! Path defaults, environment variable names and converter flags live here so the walker,
//! the runner and the CLI agree on them.

/// Default data root when no override is configured.
pub const DEFAULT_DATA_ROOT: &str = "data";

/// Default converter executable, resolved through `PATH`.
pub const DEFAULT_CONVERTER: &str = "dcm2niix";

/// Environment variable overriding the data root.
pub const DATA_ROOT_ENV: &str = "BIDSCONV_DATA_ROOT";

/// Environment variable overriding the converter executable.
pub const CONVERTER_ENV: &str = "BIDSCONV_CONVERTER";

/// Converter flag requesting a BIDS JSON sidecar.
pub const FLAG_BIDS_SIDECAR: &str = "-b";

/// Converter flag requesting gzip-compressed output.
pub const FLAG_GZIP: &str = "-z";

/// Converter flag carrying the output filename stem.
pub const FLAG_OUTPUT_STEM: &str = "-f";

/// Converter flag carrying the output directory.
pub const FLAG_OUTPUT_DIR: &str = "-o";

/// Key of the processing metadata object written into enriched sidecars.
pub const PROCESSING_INFO_KEY: &str = "_BIDSProcessingInfo";

/// Infix of sidecar backup filenames: `<sidecar>.backup_<timestamp>`.
pub const BACKUP_INFIX: &str = ".backup_";

/// Timestamp format of sidecar backup filenames.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
