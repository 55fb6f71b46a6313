//! Layered application configuration.
//!
//! Settings are declared once, with a default, an optional environment
//! variable and a usage string, then resolved in a single `parse` call.
//! Resolution order (later wins):
//! 1. Declared default
//! 2. Flat JSON configuration files, in the order their path flags were
//!    declared (the last file wins)
//! 3. Environment variables, for settings that name one
//! 4. Flags given explicitly on the command line
//!
//! [`FlagfigSet`] is the registry to build on and test against. The free
//! functions in this module are a convenience over one process-wide set,
//! [`command_line`], which parses `std::env::args_os()` and exits on error.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let addr = flagfig::string("http-addr", ":8080", "MYAPP_HTTP_ADDR", "http address");
//! let timeout =
//!     flagfig::duration("timeout", Duration::from_secs(30), "MYAPP_TIMEOUT", "request timeout");
//! flagfig::add_config_file("config", "path to a JSON configuration file");
//! flagfig::parse().unwrap();
//!
//! println!("{} {:?}", addr.get(), timeout.get());
//! ```
//!
//! A configuration file is a single flat JSON object whose keys are setting
//! names. Numbers are accepted for every numeric kind; for durations they
//! count nanoseconds.

mod args;
mod collate;
mod duration;
mod env;
mod error;
mod file;
mod nester;
mod set;
mod setting;
mod value;

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub use args::args_after_token;
pub use collate::{Diagnostic, DiagnosticKind, FilePolicy, Source};
pub use duration::{format as format_duration, parse as parse_duration};
pub use env::{EnvSource, MockEnv, ProcessEnv};
pub use error::{Error, Result};
pub use nester::{ConfigurableConfig, Nester, must_parse_nested, parse_nested, parse_nested_into};
pub use set::{ErrorHandling, FlagfigSet};
pub use setting::Setting;
pub use value::{FlagValue, Kind};

static COMMAND_LINE: LazyLock<Mutex<FlagfigSet>> =
    LazyLock::new(|| Mutex::new(FlagfigSet::new(program_name(), ErrorHandling::ExitOnError)));

fn program_name() -> String {
    std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The process-wide set behind the free functions.
pub fn command_line() -> MutexGuard<'static, FlagfigSet> {
    COMMAND_LINE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replace the process-wide set with an empty one. Meant for test
/// harnesses; handles from the old set stop receiving values.
pub fn reset_command_line(error_handling: ErrorHandling) {
    *command_line() = FlagfigSet::new(program_name(), error_handling);
}

/// Parse the process arguments into the process-wide set.
pub fn parse() -> Result<()> {
    command_line().parse(std::env::args_os().skip(1))
}

pub fn add_config_file(name: &str, usage: &str) -> Setting<String> {
    command_line().add_config_file(name, usage)
}

pub fn bool(name: &str, default: bool, env: &str, usage: &str) -> Setting<bool> {
    command_line().bool(name, default, env, usage)
}

pub fn string(name: &str, default: &str, env: &str, usage: &str) -> Setting<String> {
    command_line().string(name, default, env, usage)
}

pub fn int(name: &str, default: isize, env: &str, usage: &str) -> Setting<isize> {
    command_line().int(name, default, env, usage)
}

pub fn int64(name: &str, default: i64, env: &str, usage: &str) -> Setting<i64> {
    command_line().int64(name, default, env, usage)
}

pub fn uint(name: &str, default: usize, env: &str, usage: &str) -> Setting<usize> {
    command_line().uint(name, default, env, usage)
}

pub fn uint64(name: &str, default: u64, env: &str, usage: &str) -> Setting<u64> {
    command_line().uint64(name, default, env, usage)
}

pub fn float64(name: &str, default: f64, env: &str, usage: &str) -> Setting<f64> {
    command_line().float64(name, default, env, usage)
}

pub fn duration(name: &str, default: Duration, env: &str, usage: &str) -> Setting<Duration> {
    command_line().duration(name, default, env, usage)
}
