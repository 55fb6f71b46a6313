use std::collections::HashMap;

/// Where environment overrides are looked up.
///
/// `FlagfigSet` reads the process environment by default; tests swap in a
/// [`MockEnv`] so they never touch global state.
pub trait EnvSource: Send + Sync {
    /// Raw value of `key`, or `None` if unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        match std::env::var(key) {
            Ok(value) => Some(value),
            Err(std::env::VarError::NotPresent) => None,
            Err(std::env::VarError::NotUnicode(_)) => {
                tracing::warn!(env = key, "ignoring environment variable that is not valid UTF-8");
                None
            }
        }
    }
}

/// Environment backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvSource for MockEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Read `key` as an override: an empty variable counts as unset, and an
/// empty `key` means the setting opted out of environment lookup.
pub(crate) fn lookup_override(source: &dyn EnvSource, key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    source.get(key).filter(|value| !value.is_empty())
}
