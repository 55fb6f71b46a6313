//! Shared helpers for the resolution tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use flagfig::{ErrorHandling, FlagfigSet, MockEnv};
use serde_json::Value;
use tempfile::TempDir;

/// A scratch directory holding config files for one test.
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Write `value` as JSON to `name` and return its path as a string.
    pub fn json(&self, name: &str, value: Value) -> String {
        self.raw(name, &value.to_string())
    }

    /// Write arbitrary text, e.g. malformed JSON.
    pub fn raw(&self, name: &str, contents: &str) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write config file");
        path_string(path)
    }

    /// A path inside the directory that does not exist.
    pub fn missing(&self, name: &str) -> String {
        path_string(self.dir.path().join(name))
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_str().expect("utf-8 temp path").to_string()
}

/// A set that returns errors and reads environment from `env` only.
pub fn flags_with_env(env: MockEnv) -> FlagfigSet {
    FlagfigSet::new("test", ErrorHandling::ContinueOnError).with_env_source(env)
}

pub fn flags() -> FlagfigSet {
    flags_with_env(MockEnv::new())
}

/// `--name=value` for building argument lists.
pub fn flag(name: &str, value: &str) -> String {
    format!("--{name}={value}")
}
