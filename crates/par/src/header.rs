//! PAR header parsing.

use crate::{ParError, ParResult};

/// Column of the reconstruction resolution `x` value in V4.x image rows.
pub(crate) const COL_RECON_X: usize = 9;
/// Column of the reconstruction resolution `y` value in V4.x image rows.
pub(crate) const COL_RECON_Y: usize = 10;
/// Column of the rescale intercept in V4.x image rows.
pub(crate) const COL_RESCALE_INTERCEPT: usize = 11;
/// Column of the rescale slope in V4.x image rows.
pub(crate) const COL_RESCALE_SLOPE: usize = 12;
/// Column of the scale slope in V4.x image rows.
pub(crate) const COL_SCALE_SLOPE: usize = 13;
/// Column of the slice thickness (mm) in V4.x image rows.
pub(crate) const COL_SLICE_THICKNESS: usize = 22;
/// Column of the slice orientation code (1 TRA, 2 SAG, 3 COR) in V4.x image rows.
pub(crate) const COL_SLICE_ORIENTATION: usize = 25;
/// Column of the echo time (ms) in V4.x image rows.
pub(crate) const COL_ECHO_TIME: usize = 30;
/// Column of the flip angle (degrees) in V4.x image rows.
pub(crate) const COL_FLIP_ANGLE: usize = 35;

const EXPORT_TOOL_MARKER: &str = "research image export tool";

const PLACEHOLDERS: [&str; 6] = ["(float)", "(integer)", "n/a", "?", "null", "(string)"];

/// A parsed PAR header.
///
/// General information keys are stored normalised (lowercase, single spaces) so lookups are
/// insensitive to the column alignment the exporter uses.
#[derive(Debug, Clone, Default)]
pub struct ParHeader {
    version: Option<String>,
    general: Vec<(String, String)>,
    images: Vec<ImageRow>,
}

/// One numeric row of the image information section.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow(Vec<f64>);

impl ImageRow {
    /// Returns the value at `index`, if the row has that many columns.
    pub fn column(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ParHeader {
    /// Parses the text of a PAR file.
    ///
    /// Lines that are neither comments, general information, nor fully numeric rows are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `ParError::NotAParHeader` if no general information line is present.
    pub fn parse(text: &str) -> ParResult<Self> {
        let mut header = ParHeader::default();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(comment) = trimmed.strip_prefix('#') {
                if header.version.is_none() {
                    header.version = export_tool_version(comment);
                }
                continue;
            }

            if let Some(entry) = trimmed.strip_prefix('.') {
                if let Some((key, value)) = entry.split_once(':') {
                    let key = normalise_key(key);
                    if !key.is_empty() {
                        header.general.push((key, value.trim().to_owned()));
                    }
                }
                continue;
            }

            let values: Option<Vec<f64>> = trimmed
                .split_whitespace()
                .map(|token| token.parse::<f64>().ok())
                .collect();
            if let Some(values) = values {
                header.images.push(ImageRow(values));
            }
        }

        if header.general.is_empty() {
            return Err(ParError::NotAParHeader);
        }

        Ok(header)
    }

    /// Parses raw PAR bytes, replacing invalid UTF-8 sequences.
    ///
    /// Exporters occasionally write Latin-1 patient fields; those bytes never matter for the
    /// extracted parameters.
    pub fn parse_bytes(bytes: &[u8]) -> ParResult<Self> {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    /// Export tool version, e.g. `V4.2`.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Looks up a general information value by key.
    ///
    /// The key is matched after normalisation, so `"Repetition time [ms]"` and
    /// `"repetition  time [MS]"` are equivalent.
    pub fn general(&self, key: &str) -> Option<&str> {
        let key = normalise_key(key);
        self.general
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value found among `keys`, in order.
    pub fn general_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.general(key))
    }

    /// Reads the first numeric token of a general information value.
    pub fn general_number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|key| self.general(key))
            .find_map(|value| value.split_whitespace().next().and_then(parse_lenient_f64))
    }

    /// All general information values, in file order.
    pub fn general_values(&self) -> impl Iterator<Item = &str> {
        self.general.iter().map(|(_, v)| v.as_str())
    }

    /// Image information rows, in file order.
    pub fn images(&self) -> &[ImageRow] {
        &self.images
    }

    /// Value of `column` in the first image row that has it.
    pub fn first_image_value(&self, column: usize) -> Option<f64> {
        self.images.iter().find_map(|row| row.column(column))
    }
}

/// Parses a numeric field, treating blanks and exporter placeholders as absent.
///
/// Parentheses are stripped before parsing, so `"(2.5)"` reads as `2.5`.
pub fn parse_lenient_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || PLACEHOLDERS.iter().any(|p| trimmed.eq_ignore_ascii_case(p)) {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != '(' && *c != ')').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalise_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn export_tool_version(comment: &str) -> Option<String> {
    let lower = comment.to_ascii_lowercase();
    let start = lower.find(EXPORT_TOOL_MARKER)? + EXPORT_TOOL_MARKER.len();
    comment[start..]
        .split_whitespace()
        .next()
        .filter(|token| token.starts_with(['V', 'v']))
        .map(|token| format!("V{}", &token[1..]))
}
