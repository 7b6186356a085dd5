//! Formatting and writing of generated files.
//!
//! Emitted text goes through a [`Formatter`] (syn + prettyplease by default).
//! The generated-file header is prepended afterwards since the parser drops
//! plain comments. A file the formatter rejects is saved as
//! `<file>.unformatted` and reported once the rest of the pass is written.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, FormatFailure, Result};

/// Turns emitted source into laid-out source, or explains why it cannot.
pub trait Formatter {
    /// Laid-out source, or the parser's message.
    fn format(&self, source: &str) -> std::result::Result<String, String>;
}

/// Validates with `syn` and lays out with `prettyplease`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyFormatter;

impl Formatter for PrettyFormatter {
    fn format(&self, source: &str) -> std::result::Result<String, String> {
        let file = syn::parse_file(source).map_err(|e| e.to_string())?;
        Ok(prettyplease::unparse(&file))
    }
}

/// Header stamped on every generated file.
pub fn header(pass: &str, fingerprint: &str) -> String {
    format!("// Code generated by sdkgen {pass}. DO NOT EDIT.\n// sdkgen config: {fingerprint}\n\n")
}

/// `<file>.unformatted` next to `path`.
pub fn unformatted_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".unformatted");
    path.with_file_name(name)
}

/// The formatter's verdict on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Final file contents, header included.
    Formatted(String),
    /// The formatter rejected the source.
    Unformatted {
        /// Emitted source, header included.
        raw: String,
        /// Formatter message.
        message: String,
    },
}

/// A file ready to be written or compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Destination of the file.
    pub path: PathBuf,
    /// Formatted contents or the rejected source.
    pub rendered: Rendered,
}

impl Artifact {
    /// Format `source` and prepend `header` to the result.
    pub fn render(path: PathBuf, header: &str, source: &str, formatter: &dyn Formatter) -> Self {
        let rendered = match formatter.format(source) {
            Ok(formatted) => Rendered::Formatted(format!("{header}{formatted}")),
            Err(message) => {
                warn!(path = %path.display(), error = %message, "Generated file failed to format");
                Rendered::Unformatted {
                    raw: format!("{header}{source}"),
                    message,
                }
            }
        };
        Self { path, rendered }
    }

    /// Final contents, `None` when formatting failed.
    pub fn contents(&self) -> Option<&str> {
        match &self.rendered {
            Rendered::Formatted(text) => Some(text),
            Rendered::Unformatted { .. } => None,
        }
    }
}

/// Outcome counts of [`write_artifacts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files created or replaced.
    pub written: usize,
    /// Files already up to date.
    pub unchanged: usize,
}

enum WriteResult {
    Written,
    Unchanged,
}

fn write_file_if_changed(path: &Path, contents: &str) -> Result<WriteResult> {
    if let Ok(existing) = fs::read_to_string(path)
        && existing == contents
    {
        return Ok(WriteResult::Unchanged);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WriteResult::Written)
}

/// Save the raw text of every rejected artifact and describe each failure.
pub fn persist_failures(artifacts: &[Artifact]) -> Result<Vec<FormatFailure>> {
    let mut failures = Vec::new();
    for artifact in artifacts {
        let Rendered::Unformatted { raw, message } = &artifact.rendered else {
            continue;
        };
        let unformatted = unformatted_path(&artifact.path);
        write_file_if_changed(&unformatted, raw)?;
        failures.push(FormatFailure {
            path: artifact.path.clone(),
            unformatted_path: unformatted,
            message: message.clone(),
        });
    }
    Ok(failures)
}

/// Write every formatted artifact, skipping files whose contents match.
///
/// Rejected artifacts are not written; their raw text goes to
/// `<file>.unformatted` and the call fails with [`Error::Format`] after the
/// others are on disk.
pub fn write_artifacts(artifacts: &[Artifact]) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();
    for artifact in artifacts {
        let Some(contents) = artifact.contents() else {
            continue;
        };
        match write_file_if_changed(&artifact.path, contents)? {
            WriteResult::Written => {
                debug!(path = %artifact.path.display(), "Wrote generated file");
                summary.written += 1;
            }
            WriteResult::Unchanged => summary.unchanged += 1,
        }

        let stale = unformatted_path(&artifact.path);
        if stale.exists() {
            fs::remove_file(&stale).map_err(|source| Error::Write {
                path: stale.clone(),
                source,
            })?;
        }
    }

    let failures = persist_failures(artifacts)?;
    info!(
        written = summary.written,
        unchanged = summary.unchanged,
        failed = failures.len(),
        "Generated files written"
    );
    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(Error::Format(failures))
    }
}

/// A generated file whose on-disk copy differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    /// Generated file.
    pub path: PathBuf,
    /// `None` when the file does not exist yet.
    pub current: Option<String>,
    /// Freshly generated contents.
    pub expected: String,
}

/// Compare formatted artifacts with the files on disk without writing them.
pub fn compare_artifacts(artifacts: &[Artifact]) -> Result<Vec<Drift>> {
    let failures = persist_failures(artifacts)?;
    if !failures.is_empty() {
        return Err(Error::Format(failures));
    }

    let mut drift = Vec::new();
    for artifact in artifacts {
        let Some(expected) = artifact.contents() else {
            continue;
        };
        let current = match fs::read_to_string(&artifact.path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(Error::Read {
                    path: artifact.path.clone(),
                    source,
                });
            }
        };
        if current.as_deref() != Some(expected) {
            drift.push(Drift {
                path: artifact.path.clone(),
                current,
                expected: expected.to_string(),
            });
        }
    }
    Ok(drift)
}
