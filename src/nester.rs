//! Composing configuration groups under one parse pass.
//!
//! Each group implements [`Nester`]: it declares its settings into a shared
//! [`FlagfigSet`] and, once everything is resolved, derives whatever it
//! needs from the resolved values. A parent group holds its children as
//! fields and either forwards both calls or lists the children next to
//! itself in [`parse_nested`].
//!
//! ```
//! use flagfig::{ConfigurableConfig, ErrorHandling, FlagfigSet, Nester, Setting};
//!
//! struct Database {
//!     url: Option<Setting<String>>,
//!     url_conf: ConfigurableConfig,
//! }
//!
//! impl Nester for Database {
//!     fn register_flags(&mut self, flags: &mut FlagfigSet) {
//!         self.url = Some(flags.string(
//!             &self.url_conf.flag_name,
//!             "postgres://localhost/app",
//!             &self.url_conf.env_name,
//!             "database url",
//!         ));
//!     }
//! }
//!
//! let mut primary = Database {
//!     url: None,
//!     url_conf: ConfigurableConfig::new("primary-url", "PRIMARY_URL"),
//! };
//! let mut replica = Database {
//!     url: None,
//!     url_conf: ConfigurableConfig::new("replica-url", "REPLICA_URL"),
//! };
//! flagfig::parse_nested(
//!     ErrorHandling::ContinueOnError,
//!     &mut [&mut primary, &mut replica],
//!     ["--replica-url=postgres://replica/app"],
//! )
//! .unwrap();
//! assert_eq!(replica.url.unwrap().get(), "postgres://replica/app");
//! ```

use std::ffi::OsString;

use crate::error::{Error, Result};
use crate::set::{ErrorHandling, FlagfigSet};

/// A group of settings that can be composed with others.
pub trait Nester {
    /// Declare this group's settings. Keep it to declarations; derived
    /// values belong in [`Nester::after_parsed`].
    fn register_flags(&mut self, flags: &mut FlagfigSet);

    /// Validate or derive values once every layer has been applied.
    fn after_parsed(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Flag and environment names for one setting, so that a group can be
/// reused under different names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurableConfig {
    /// Command-line flag name, also the key looked up in config files.
    pub flag_name: String,
    /// Environment variable name; empty skips the environment.
    pub env_name: String,
}

impl ConfigurableConfig {
    pub fn new(flag_name: impl Into<String>, env_name: impl Into<String>) -> Self {
        Self {
            flag_name: flag_name.into(),
            env_name: env_name.into(),
        }
    }
}

/// Register every group, parse `args`, then run each group's
/// `after_parsed` in order, stopping at the first failure.
///
/// Returns the shared set so callers can inspect remaining arguments,
/// provenance and diagnostics.
pub fn parse_nested<I, T>(
    handling: ErrorHandling,
    nested: &mut [&mut dyn Nester],
    args: I,
) -> Result<FlagfigSet>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    parse_nested_into(FlagfigSet::new("", handling), nested, args)
}

/// [`parse_nested`] over a set the caller has already configured, e.g.
/// with a different environment source or file policy.
pub fn parse_nested_into<I, T>(
    mut flags: FlagfigSet,
    nested: &mut [&mut dyn Nester],
    args: I,
) -> Result<FlagfigSet>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    for group in nested.iter_mut() {
        group.register_flags(&mut flags);
    }
    flags.parse(args)?;
    for group in nested.iter_mut() {
        group.after_parsed().map_err(Error::AfterParsed)?;
    }
    Ok(flags)
}

/// Like [`parse_nested`], but panics on error.
pub fn must_parse_nested<I, T>(
    handling: ErrorHandling,
    nested: &mut [&mut dyn Nester],
    args: I,
) -> FlagfigSet
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match parse_nested(handling, nested, args) {
        Ok(flags) => flags,
        Err(err) => panic!("{err}"),
    }
}
