//! Philips PAR header support
//!
//! PAR/REC is the Philips research export format. The `.PAR` file is a plain-text header
//! that carries acquisition parameters which converters do not always transfer into the BIDS
//! sidecar JSON. This crate reads those headers and derives the BIDS fields from them.
//!
//! ## Header layout
//!
//! ```text
//! # CLINICAL TRYOUT             Research image export tool     V4.2
//! # === GENERAL INFORMATION ========================================
//! .    Protocol name                      :   WIP fMRI rest
//! .    Max. number of slices/locations    :   37
//! .    Repetition time [ms]               :   2300.000
//! # === IMAGE INFORMATION ==========================================
//!   1   1    1  1 0 2     0  16 ...
//! ```
//!
//! General information lines start with `.` and hold `key : value` pairs. Image information
//! rows are whitespace-separated numeric columns, one row per stored slice.
//!
//! ## Example Usage
//!
//! ```no_run
//! use bidsconv_par::{extract_bids_params, ParHeader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let text = std::fs::read_to_string("sub-01_ses-1_task-rest_bold.PAR")?;
//! let header = ParHeader::parse(&text)?;
//! let params = extract_bids_params(&header);
//! println!("TR = {:?}", params.repetition_time);
//! # Ok(())
//! # }
//! ```

mod header;
mod params;

pub use header::{parse_lenient_f64, ImageRow, ParHeader};
pub use params::{
    extract_bids_params, interleaved_slice_timing, BidsParams, MAX_TIMED_SLICES,
    PHILIPS_WFS_BANDWIDTH_FACTOR,
};

/// Errors that can occur while reading PAR headers
#[derive(Debug, thiserror::Error)]
pub enum ParError {
    /// The text contained no general information lines
    #[error("not a PAR header: no general information lines found")]
    NotAParHeader,
}

/// Result type for PAR operations.
pub type ParResult<T> = Result<T, ParError>;
