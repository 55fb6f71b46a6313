//! Fills every setting the command line did not set explicitly.
//!
//! Layers are applied lowest first: configuration files in registration
//! order (a later file overwrites an earlier one), then environment
//! variables. Explicit command-line values are never in `pending` and so
//! are never touched here.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Number, Value};

use crate::env::{EnvSource, lookup_override};
use crate::error::{Error, Result};
use crate::file::FileSnapshot;
use crate::set::Entry;
use crate::value::Kind;

/// The layer that supplied a setting's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layer", content = "from", rename_all = "snake_case")]
pub enum Source {
    Default,
    File(PathBuf),
    Env(String),
    CommandLine,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Env(key) => write!(f, "env {key}"),
            Self::CommandLine => f.write_str("command line"),
        }
    }
}

/// How file-level problems are treated during resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilePolicy {
    /// Unreadable files, malformed JSON, unsupported or unparsable values
    /// are skipped and reported through [`Diagnostic`]s.
    #[default]
    Lenient,
    /// The same problems abort `parse` with an error.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnreadableFile,
    MalformedFile,
    TypeMismatch,
    UnsupportedValue,
    InvalidValue,
}

/// A recoverable problem met while resolving, kept after `parse` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<PathBuf>,
    pub key: Option<String>,
    pub message: String,
}

/// Outcome of converting one JSON value for a declared kind.
#[derive(Debug, PartialEq, Eq)]
enum Coerced {
    /// Text to hand to the kind's parser.
    Text(String),
    /// Wrong JSON type for the kind; skipped with a warning.
    Mismatch(&'static str),
    /// `null`, arrays and objects are never accepted.
    Unsupported(&'static str),
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Base-10 integer text; fractional numbers round to the nearest integer.
fn integer_text(number: &Number) -> String {
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    let rounded = format!("{:.0}", number.as_f64().unwrap_or(f64::NAN));
    if rounded == "-0" {
        "0".to_string()
    } else {
        rounded
    }
}

fn float_text(number: &Number) -> String {
    number.as_f64().unwrap_or(f64::NAN).to_string()
}

fn coerce(kind: Kind, value: &Value) -> Coerced {
    if matches!(value, Value::Null | Value::Array(_) | Value::Object(_)) {
        return Coerced::Unsupported(json_type(value));
    }
    match kind {
        Kind::Bool => match value {
            Value::Bool(flag) => Coerced::Text(flag.to_string()),
            other => Coerced::Mismatch(json_type(other)),
        },
        Kind::String => match value {
            Value::String(text) => Coerced::Text(text.clone()),
            other => Coerced::Mismatch(json_type(other)),
        },
        Kind::Int | Kind::Int64 | Kind::Uint | Kind::Uint64 => match value {
            Value::Number(number) => Coerced::Text(integer_text(number)),
            other => Coerced::Mismatch(json_type(other)),
        },
        Kind::Float64 => match value {
            Value::Number(number) => Coerced::Text(float_text(number)),
            other => Coerced::Mismatch(json_type(other)),
        },
        // Duration parsers need a unit, so numbers are taken as nanoseconds.
        Kind::Duration => match value {
            Value::Number(number) => Coerced::Text(format!("{}ns", integer_text(number))),
            other => Coerced::Mismatch(json_type(other)),
        },
    }
}

/// One resolution pass over the registry's entries.
pub(crate) struct Resolver<'a> {
    pub policy: FilePolicy,
    pub env: &'a dyn EnvSource,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl Resolver<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = ?diagnostic.kind,
            path = ?diagnostic.path,
            key = ?diagnostic.key,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Read every non-empty path, in order.
    pub fn load_files(&mut self, paths: &[String]) -> Result<Vec<FileSnapshot>> {
        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths.iter().filter(|path| !path.is_empty()) {
            match FileSnapshot::load(Path::new(path)) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) if self.policy == FilePolicy::Strict => return Err(err),
                Err(err) => {
                    let kind = match err {
                        Error::Decode { .. } => DiagnosticKind::MalformedFile,
                        _ => DiagnosticKind::UnreadableFile,
                    };
                    self.report(Diagnostic {
                        kind,
                        path: Some(PathBuf::from(path)),
                        key: None,
                        message: format!("skipping config file: {err}"),
                    });
                }
            }
        }
        Ok(snapshots)
    }

    /// Merge file values into pending entries; the last file wins.
    pub fn apply_files(
        &mut self,
        snapshots: &[FileSnapshot],
        entries: &mut BTreeMap<String, Entry>,
        pending: &BTreeSet<String>,
    ) -> Result<()> {
        for snapshot in snapshots {
            for (key, value) in &snapshot.values {
                if !pending.contains(key) {
                    continue;
                }
                let Some(entry) = entries.get_mut(key) else {
                    continue;
                };
                let kind = entry.slot.kind();
                match coerce(kind, value) {
                    Coerced::Text(text) => match entry.slot.set_text(&text) {
                        Ok(()) => {
                            tracing::debug!(
                                name = %key,
                                path = %snapshot.path.display(),
                                "value from config file"
                            );
                            entry.source = Source::File(snapshot.path.clone());
                        }
                        Err(reason) if self.policy == FilePolicy::Strict => {
                            return Err(Error::InvalidValue {
                                name: key.clone(),
                                kind,
                                value: text,
                                origin: format!("config file {}", snapshot.path.display()),
                                reason,
                            });
                        }
                        Err(reason) => self.report(Diagnostic {
                            kind: DiagnosticKind::InvalidValue,
                            path: Some(snapshot.path.clone()),
                            key: Some(key.clone()),
                            message: format!(
                                "skipping {kind} value {text:?} for {key:?}: {reason}"
                            ),
                        }),
                    },
                    Coerced::Mismatch(found) => self.report(Diagnostic {
                        kind: DiagnosticKind::TypeMismatch,
                        path: Some(snapshot.path.clone()),
                        key: Some(key.clone()),
                        message: format!("skipping {found} value for {kind} setting {key:?}"),
                    }),
                    Coerced::Unsupported(found) if self.policy == FilePolicy::Strict => {
                        return Err(Error::UnsupportedValue {
                            path: snapshot.path.clone(),
                            key: key.clone(),
                            found,
                        });
                    }
                    Coerced::Unsupported(found) => self.report(Diagnostic {
                        kind: DiagnosticKind::UnsupportedValue,
                        path: Some(snapshot.path.clone()),
                        key: Some(key.clone()),
                        message: format!("skipping unsupported {found} value for {key:?}"),
                    }),
                }
            }
        }
        Ok(())
    }

    /// Environment overrides whatever the files left behind.
    pub fn apply_env(
        &mut self,
        entries: &mut BTreeMap<String, Entry>,
        pending: &BTreeSet<String>,
    ) -> Result<()> {
        for name in pending {
            let Some(entry) = entries.get_mut(name) else {
                continue;
            };
            let Some(value) = lookup_override(self.env, &entry.env) else {
                continue;
            };
            entry
                .slot
                .set_text(&value)
                .map_err(|reason| Error::InvalidValue {
                    name: name.clone(),
                    kind: entry.slot.kind(),
                    value: value.clone(),
                    origin: format!("environment variable {}", entry.env),
                    reason,
                })?;
            tracing::debug!(name = %name, env = %entry.env, "value from environment");
            entry.source = Source::Env(entry.env.clone());
        }
        Ok(())
    }
}
