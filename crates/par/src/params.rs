//! BIDS parameter extraction from parsed PAR headers.

use crate::header::{
    parse_lenient_f64, ParHeader, COL_ECHO_TIME, COL_FLIP_ANGLE, COL_RECON_X, COL_RECON_Y,
    COL_RESCALE_INTERCEPT, COL_RESCALE_SLOPE, COL_SCALE_SLOPE, COL_SLICE_ORIENTATION,
    COL_SLICE_THICKNESS,
};

/// Philips water-fat shift constant: fat/water chemical shift (3.4 ppm) times the 3T proton
/// Larmor frequency, in Hz.
pub const PHILIPS_WFS_BANDWIDTH_FACTOR: f64 = 434.215;

/// Largest slice count for which `SliceTiming` is derived. Headers claiming more are treated
/// as corrupt for timing purposes.
pub const MAX_TIMED_SLICES: u32 = 1024;

const TR_KEYS: [&str; 3] = ["Repetition time [ms]", "Repetition time", "TR"];
const TE_KEYS: [&str; 3] = ["Echo time [ms]", "Echo time", "TE"];
const SLICES_KEYS: [&str; 3] = [
    "Max. number of slices/locations",
    "Number of slices",
    "number of slices",
];
const ORIENTATION_KEYS: [&str; 2] = ["Slice orientation", "slice orientation ( TRA/SAG/COR )"];
const POSITION_KEYS: [&str; 1] = ["Patient position"];
const PREPARATION_KEYS: [&str; 5] = [
    "Preparation direction",
    "Phase encoding direction",
    "PE direction",
    "Fold-over direction",
    "Foldover direction",
];
const WFS_KEYS: [&str; 3] = ["Water Fat shift [pixels]", "Water Fat shift", "WFS"];
const RECON_KEYS: [&str; 2] = ["Recon resolution (x, y)", "Recon resolution (x,y)"];
const THICKNESS_KEYS: [&str; 2] = ["Slice thickness [mm]", "Slice thickness"];
const FLIP_KEYS: [&str; 2] = ["Flip angle [degrees]", "Flip angle"];
const PROTOCOL_KEYS: [&str; 2] = ["Protocol name", "Examination name"];
const SERIES_KEYS: [&str; 2] = ["Series nr", "Series number"];
const ACQUISITION_KEYS: [&str; 2] = ["Acquisition nr", "Acquisition number"];

const FMRI_HINTS: [&str; 6] = ["rest", "bold", "fmri", "epi", "task", "sense"];

/// BIDS sidecar fields derived from a PAR header.
///
/// Every field is optional; only values the header supports are set. Serialises to the
/// BIDS key names, omitting absent fields.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BidsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_slices: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_timing: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_encoding_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_encoding_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_fat_shift: Option<f64>,
    #[serde(rename = "ReconMatrixPE", skip_serializing_if = "Option::is_none")]
    pub recon_matrix_pe: Option<u32>,
    #[serde(rename = "ReconMatrixFE", skip_serializing_if = "Option::is_none")]
    pub recon_matrix_fe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_echo_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_readout_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_thickness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flip_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub philips_rescale_slope: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub philips_rescale_intercept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub philips_scale_slope: Option<f64>,

    /// Export tool version of the source header. Not a BIDS field.
    #[serde(skip)]
    pub par_version: Option<String>,
}

impl BidsParams {
    /// Number of BIDS fields that were derived.
    pub fn field_count(&self) -> usize {
        [
            self.repetition_time.is_some(),
            self.echo_time.is_some(),
            self.number_of_slices.is_some(),
            self.slice_timing.is_some(),
            self.slice_encoding_direction.is_some(),
            self.phase_encoding_direction.is_some(),
            self.water_fat_shift.is_some(),
            self.recon_matrix_pe.is_some(),
            self.recon_matrix_fe.is_some(),
            self.effective_echo_spacing.is_some(),
            self.total_readout_time.is_some(),
            self.slice_thickness.is_some(),
            self.flip_angle.is_some(),
            self.task_name.is_some(),
            self.manufacturer.is_some(),
            self.patient_position.is_some(),
            self.protocol_name.is_some(),
            self.series_number.is_some(),
            self.acquisition_number.is_some(),
            self.philips_rescale_slope.is_some(),
            self.philips_rescale_intercept.is_some(),
            self.philips_scale_slope.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// Derives BIDS sidecar parameters from a PAR header.
///
/// Times in the header are milliseconds and are converted to seconds.
pub fn extract_bids_params(header: &ParHeader) -> BidsParams {
    let mut params = BidsParams {
        par_version: header.version().map(str::to_owned),
        manufacturer: Some("Philips".to_owned()),
        ..BidsParams::default()
    };

    params.repetition_time = header
        .general_number(&TR_KEYS)
        .filter(|tr| *tr > 0.0)
        .map(|tr| round_to(tr / 1000.0, 6));

    params.echo_time = header
        .general_number(&TE_KEYS)
        .or_else(|| header.first_image_value(COL_ECHO_TIME))
        .filter(|te| *te > 0.0)
        .map(|te| round_to(te / 1000.0, 6));

    params.number_of_slices = header
        .general_number(&SLICES_KEYS)
        .and_then(positive_u32);

    if let (Some(tr), Some(n)) = (params.repetition_time, params.number_of_slices) {
        if n <= MAX_TIMED_SLICES {
            params.slice_timing = Some(interleaved_slice_timing(tr, n as usize));
        }
    }

    params.slice_encoding_direction = slice_encoding_direction(header).map(str::to_owned);
    params.phase_encoding_direction = phase_encoding_direction(header).map(str::to_owned);

    params.water_fat_shift = header.general_number(&WFS_KEYS).filter(|w| *w > 0.0);

    if let Some((fe, pe)) = recon_matrix(header) {
        params.recon_matrix_fe = Some(fe);
        params.recon_matrix_pe = Some(pe);
    }

    if let (Some(wfs), Some(pe)) = (params.water_fat_shift, params.recon_matrix_pe) {
        let bandwidth_per_pixel_hz = PHILIPS_WFS_BANDWIDTH_FACTOR / wfs;
        let ees = 1.0 / (bandwidth_per_pixel_hz * f64::from(pe));
        params.effective_echo_spacing = Some(round_to(ees, 8));
        if pe > 1 {
            params.total_readout_time = Some(round_to(ees * f64::from(pe - 1), 8));
        }
    }

    params.slice_thickness = header
        .general_number(&THICKNESS_KEYS)
        .or_else(|| header.first_image_value(COL_SLICE_THICKNESS))
        .filter(|t| *t > 0.0);

    params.flip_angle = header
        .general_number(&FLIP_KEYS)
        .or_else(|| header.first_image_value(COL_FLIP_ANGLE))
        .filter(|a| *a > 0.0);

    params.protocol_name = non_blank(header.general_any(&PROTOCOL_KEYS));
    params.task_name = params
        .protocol_name
        .as_deref()
        .map(|protocol| task_name(protocol).to_owned());
    params.patient_position = non_blank(header.general_any(&POSITION_KEYS));

    params.series_number = header.general_number(&SERIES_KEYS).and_then(positive_u32);
    params.acquisition_number = header
        .general_number(&ACQUISITION_KEYS)
        .and_then(positive_u32);

    // Scaling comes from the first image row wide enough to carry all three values.
    if let Some(row) = header
        .images()
        .iter()
        .find(|row| row.len() > COL_SCALE_SLOPE)
    {
        params.philips_rescale_intercept = row.column(COL_RESCALE_INTERCEPT);
        params.philips_rescale_slope = row.column(COL_RESCALE_SLOPE).filter(|s| *s != 0.0);
        params.philips_scale_slope = row.column(COL_SCALE_SLOPE).filter(|s| *s != 0.0);
    }

    params
}

/// Slice acquisition times for Philips interleaved ascending acquisition from the bottom.
///
/// Odd slice numbers (1, 3, 5, ...) are acquired first, then even ones (2, 4, ...). The
/// returned vector is indexed by 0-based slice position and holds onset times in seconds,
/// rounded to 6 decimals.
pub fn interleaved_slice_timing(repetition_time: f64, n_slices: usize) -> Vec<f64> {
    if n_slices == 0 {
        return Vec::new();
    }

    let time_per_slice = repetition_time / n_slices as f64;
    let acquisition_order = (0..n_slices).step_by(2).chain((1..n_slices).step_by(2));

    let mut timing = vec![0.0; n_slices];
    for (acquired_at, slice_index) in acquisition_order.enumerate() {
        timing[slice_index] = round_to(acquired_at as f64 * time_per_slice, 6);
    }
    timing
}

fn slice_encoding_direction(header: &ParHeader) -> Option<&'static str> {
    let code = header
        .general_number(&ORIENTATION_KEYS)
        .or_else(|| {
            header
                .images()
                .iter()
                .filter_map(|row| row.column(COL_SLICE_ORIENTATION))
                .find(|code| matches!(*code as i64, 1..=3))
        })
        .map(|code| code as i64);

    match code {
        Some(1) => return Some("k"),
        Some(2) => return Some("i"),
        Some(3) => return Some("j"),
        _ => {}
    }

    if let Some(position) = header.general_any(&POSITION_KEYS) {
        let position = position.to_ascii_uppercase();
        if position.contains("HEAD FIRST SUPINE") || position.contains("HFS") {
            return Some("k");
        }
    }

    let looks_like_fmri = header.general_values().any(|value| {
        let value = value.to_ascii_lowercase();
        FMRI_HINTS.iter().any(|hint| value.contains(hint))
    });
    looks_like_fmri.then_some("k")
}

fn phase_encoding_direction(header: &ParHeader) -> Option<&'static str> {
    PREPARATION_KEYS
        .iter()
        .filter_map(|key| header.general(key))
        .find_map(|direction| {
            let direction = direction.trim().to_ascii_lowercase();
            if direction.contains("anterior-posterior") || direction == "ap" {
                Some("j-")
            } else if direction.contains("posterior-anterior") || direction == "pa" {
                Some("j")
            } else if direction.contains("left-right") || direction == "lr" {
                Some("i-")
            } else if direction.contains("right-left") || direction == "rl" {
                Some("i")
            } else {
                None
            }
        })
}

fn recon_matrix(header: &ParHeader) -> Option<(u32, u32)> {
    let from_general = header.general_any(&RECON_KEYS).and_then(|value| {
        let mut numbers = value.split_whitespace().filter_map(parse_lenient_f64);
        Some((numbers.next()?, numbers.next()?))
    });

    let (x, y) = from_general.or_else(|| {
        header.images().iter().find_map(|row| {
            Some((row.column(COL_RECON_X)?, row.column(COL_RECON_Y)?))
        })
    })?;

    Some((positive_u32(x)?, positive_u32(y)?))
}

fn task_name(protocol: &str) -> &'static str {
    let protocol = protocol.to_ascii_lowercase();
    if ["rest", "resting", "state"].iter().any(|t| protocol.contains(t)) {
        "rest"
    } else if protocol.contains("nback") {
        "nback"
    } else if ["faces", "emotion"].iter().any(|t| protocol.contains(t)) {
        "faces"
    } else {
        "rest"
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn positive_u32(value: f64) -> Option<u32> {
    (value >= 1.0 && value <= f64::from(u32::MAX)).then(|| value as u32)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
