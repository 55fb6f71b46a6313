use std::path::PathBuf;

use crate::value::Kind;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything `FlagfigSet::parse` and the nested helpers can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unknown command-line flags, or `--help`.
    #[error(transparent)]
    Args(#[from] clap::Error),

    /// A configuration file could not be read (strict policy only).
    #[error("read config file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not a flat JSON object (strict policy only).
    #[error("decode config file {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A file value is `null`, an array or an object (strict policy only).
    #[error("unsupported value for {key:?} in {}: {found}", .path.display())]
    UnsupportedValue {
        path: PathBuf,
        key: String,
        found: &'static str,
    },

    /// A value from the environment (or, under the strict policy, a file)
    /// was rejected by the setting's parser.
    #[error("invalid {kind} value {value:?} for {name:?} from {origin}: {reason}")]
    InvalidValue {
        name: String,
        kind: Kind,
        value: String,
        origin: String,
        reason: String,
    },

    #[error("post-parse hook failed: {0:#}")]
    AfterParsed(anyhow::Error),
}
