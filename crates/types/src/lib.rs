//! Value types shared across the bidsconv crates.
//!
//! Subjects and sessions are identified by their directory names, taken verbatim as
//! [`OsString`]s so that names which are not valid UTF-8 still reach the converter byte for
//! byte. The only rejected value is the empty string, since an empty name can never come from
//! a directory entry and would produce a malformed output stem.

use std::ffi::{OsStr, OsString};

/// Errors that can occur when creating identifier types.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The identifier was the empty string
    #[error("{0} identifier cannot be empty")]
    Empty(&'static str),
    /// The identifier cannot be represented as text
    #[error("{0} identifier is not valid UTF-8")]
    NotUnicode(&'static str),
}

/// A subject identifier: the name of a directory directly under the data root.
///
/// Unlike trimmed text types, no whitespace is removed. Output names must reproduce the
/// directory name exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectId(OsString);

/// A session identifier: the name of a directory directly under a subject directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(OsString);

macro_rules! verbatim_id {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// Creates the identifier from a directory name, unchanged.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if `name` is the empty string.
            pub fn new(name: impl Into<OsString>) -> Result<Self, IdError> {
                let name = name.into();
                if name.is_empty() {
                    return Err(IdError::Empty($label));
                }
                Ok(Self(name))
            }

            /// Returns the directory name exactly as read.
            pub fn as_os_str(&self) -> &OsStr {
                &self.0
            }

            /// Returns the identifier as a string slice, if it is valid UTF-8.
            pub fn to_str(&self) -> Option<&str> {
                self.0.to_str()
            }
        }

        /// Lossy rendering for log lines; invalid UTF-8 shows as U+FFFD.
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.to_string_lossy())
            }
        }

        impl AsRef<OsStr> for $ty {
            fn as_ref(&self) -> &OsStr {
                &self.0
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                match self.0.to_str() {
                    Some(name) => serializer.serialize_str(name),
                    None => Err(<S::Error as serde::ser::Error>::custom(IdError::NotUnicode(
                        $label,
                    ))),
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

verbatim_id!(SubjectId, "subject");
verbatim_id!(SessionId, "session");

/// An imaging modality with a fixed directory name under each session.
///
/// The declaration order is the traversal order within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Anatomical (T1-weighted) acquisitions
    Anat,
    /// Functional (resting-state BOLD) acquisitions
    Func,
}

impl Modality {
    /// All modalities, in the order they are visited within a session.
    pub const ALL: [Modality; 2] = [Modality::Anat, Modality::Func];

    /// Name of the modality directory under a session directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Modality::Anat => "anat",
            Modality::Func => "func",
        }
    }

    /// Suffix appended to `<subject>_<session>_` to form the output filename stem.
    pub fn suffix(self) -> &'static str {
        match self {
            Modality::Anat => "T1w",
            Modality::Func => "task-rest_bold",
        }
    }

    /// Builds the converter output stem for a subject/session pair.
    ///
    /// Both names are copied unchanged, including bytes that are not valid UTF-8.
    pub fn output_stem(self, subject: &SubjectId, session: &SessionId) -> OsString {
        let mut stem = subject.as_os_str().to_owned();
        stem.push("_");
        stem.push(session.as_os_str());
        stem.push("_");
        stem.push(self.suffix());
        stem
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}
