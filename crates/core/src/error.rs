//! Errors of a generation run.

use std::path::PathBuf;

use sdkgen_common::ConfigError;

/// Errors that abort a generation run.
///
/// Per-schema and per-property problems are not errors: they are logged and
/// the item is skipped. Formatting failures are collected per file and only
/// surface here once the whole pass has been written.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A spec or generated file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A generated file or its directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File or directory that was written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document without a known extension parsed as neither JSON nor YAML.
    #[error("failed to parse {origin} as JSON ({json}) or YAML ({yaml})")]
    Parse {
        /// File path or label of the document.
        origin: String,
        /// JSON parser message.
        json: String,
        /// YAML parser message.
        yaml: String,
    },

    /// A document failed to parse in the format its extension names.
    #[error("failed to parse {origin} as {format}: {message}")]
    ParseFormat {
        /// File path or label of the document.
        origin: String,
        /// `JSON` or `YAML`.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The generator configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Some generated files were rejected by the formatter.
    #[error("{} generated file(s) failed to format: {}", .0.len(), join_paths(.0))]
    Format(Vec<FormatFailure>),
}

/// One file the formatter rejected.
#[derive(Debug, Clone)]
pub struct FormatFailure {
    /// Where the file would have been written.
    pub path: PathBuf,
    /// Where the raw text was saved instead.
    pub unformatted_path: PathBuf,
    /// Formatter message.
    pub message: String,
}

fn join_paths(failures: &[FormatFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.path.display(), f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for fallible generator calls.
pub type Result<T> = std::result::Result<T, Error>;
