//! Tap map load errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or resolving a tap map.
///
/// Every variant names the offending mode, slot or field so a user can find
/// the problem in their document.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid tap map document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate mode name '{0}'")]
    DuplicateModeName(String),

    #[error("Mode '{mode}' extends unknown mode '{parent}'")]
    UnknownExtends { mode: String, parent: String },

    #[error("Circular extends: {}", .chain.join(" -> "))]
    CircularExtends { chain: Vec<String> },

    #[error("Mode '{mode}' redefines slot {slot:02} inherited from '{parent}'")]
    ConflictingHotkey {
        mode: String,
        parent: String,
        slot: usize,
    },

    #[error("Mode '{mode}' defines slot {slot:02} more than once")]
    DuplicateSlot { mode: String, slot: usize },

    #[error("No default mode (set ':default: true' on one mode)")]
    NoDefaultMap,

    #[error("Multiple default modes: {}", .0.join(", "))]
    MultipleDefaultMaps(Vec<String>),

    #[error("Mode '{mode}' switches to unknown mode '{target}'")]
    UnknownModeTarget { mode: String, target: String },

    #[error("Mode '{mode}': annotation '{annotation}' selects slot 0, which cannot be tapped")]
    InvalidSlot { mode: String, annotation: String },

    #[error("Mode '{mode}': invalid annotation '{annotation}' (expected 5 of '.' and '-')")]
    InvalidAnnotation { mode: String, annotation: String },

    #[error("{context}: missing field '{field}'")]
    MissingField {
        context: String,
        field: &'static str,
    },

    #[error("{context}: unexpected field '{field}'")]
    UnexpectedField { context: String, field: String },

    #[error("{context}: unknown key '{name}'")]
    UnknownKey { context: String, name: String },

    #[error("{context}: {reason}")]
    InvalidHotkey { context: String, reason: String },

    #[error("{context}: multi-tap list is empty")]
    EmptyMultiTap { context: String },

    #[error("{context}: expected {expected}")]
    InvalidValue {
        context: String,
        expected: &'static str,
    },
}

impl From<serde_yaml::Error> for MapError {
    fn from(e: serde_yaml::Error) -> Self {
        let (line, column) = e
            .location()
            .map_or((0, 0), |loc| (loc.line(), loc.column()));
        MapError::Parse {
            line,
            column,
            message: e.to_string(),
        }
    }
}
