use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, Command};

use crate::collate::{Diagnostic, FilePolicy, Resolver, Source};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{Error, Result};
use crate::file::FileSnapshot;
use crate::setting::Setting;
use crate::value::{FlagValue, Kind};

/// Id of the hidden positional that collects everything after the flags.
const REST_ARGS: &str = "flagfig::args";

/// What `parse` does when something goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Return the error to the caller.
    ContinueOnError,
    /// Print the error (or the requested help) and exit the process.
    ExitOnError,
    /// Panic with the error message.
    PanicOnError,
}

/// Registry state for one declared setting.
#[derive(Debug)]
pub(crate) struct Entry {
    pub slot: crate::setting::Slot,
    pub env: String,
    pub usage: String,
    /// Formatted default, `None` for the kind's zero value.
    pub default: Option<String>,
    pub source: Source,
}

impl Entry {
    fn arg(&self, name: &str) -> Arg {
        let kind = self.slot.kind();
        let mut help = self.usage.clone();
        if let Some(default) = &self.default {
            help.push_str(&format!(" (default: {default})"));
        }
        if !self.env.is_empty() {
            help.push_str(&format!(" [env: {}]", self.env));
        }

        let arg = Arg::new(name.to_string())
            .long(name.to_string())
            .help(help)
            .value_name(kind.value_name())
            .value_parser(self.slot.value_parser())
            .action(ArgAction::Set);
        match kind {
            // `--flag` alone means true; a following token is never eaten.
            Kind::Bool => arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            _ => arg.allow_hyphen_values(true),
        }
    }
}

#[derive(Debug)]
struct ConfigFileFlag {
    name: String,
    usage: String,
    path: Setting<String>,
}

/// A registry of typed settings resolved from the command line, the
/// environment and flat JSON configuration files.
///
/// Precedence, highest first: explicit command-line flags, environment
/// variables, configuration files (the last file listed wins), defaults.
///
/// ```no_run
/// use flagfig::{ErrorHandling, FlagfigSet};
///
/// let mut flags = FlagfigSet::new("server", ErrorHandling::ExitOnError);
/// let addr = flags.string("http-addr", ":8080", "SERVER_HTTP_ADDR", "listen address");
/// flags.add_config_file("config", "path to a JSON config file");
/// flags.parse(std::env::args_os().skip(1)).unwrap();
/// println!("listening on {}", addr.get());
/// ```
pub struct FlagfigSet {
    name: String,
    error_handling: ErrorHandling,
    entries: BTreeMap<String, Entry>,
    config_files: Vec<ConfigFileFlag>,
    env: Box<dyn EnvSource>,
    policy: FilePolicy,
    snapshots: Option<Vec<FileSnapshot>>,
    diagnostics: Vec<Diagnostic>,
    explicit: BTreeSet<String>,
    args: Vec<String>,
    parsed: bool,
}

impl fmt::Debug for FlagfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagfigSet")
            .field("name", &self.name)
            .field("error_handling", &self.error_handling)
            .field("entries", &self.entries)
            .field("config_files", &self.config_files)
            .field("policy", &self.policy)
            .field("parsed", &self.parsed)
            .finish_non_exhaustive()
    }
}

impl FlagfigSet {
    pub fn new(name: impl Into<String>, error_handling: ErrorHandling) -> Self {
        Self {
            name: name.into(),
            error_handling,
            entries: BTreeMap::new(),
            config_files: Vec::new(),
            env: Box::new(ProcessEnv),
            policy: FilePolicy::default(),
            snapshots: None,
            diagnostics: Vec::new(),
            explicit: BTreeSet::new(),
            args: Vec::new(),
            parsed: false,
        }
    }

    /// Look environment overrides up in `env` instead of the process
    /// environment.
    pub fn with_env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.set_env_source(env);
        self
    }

    pub fn set_env_source(&mut self, env: impl EnvSource + 'static) {
        self.env = Box::new(env);
    }

    pub fn with_file_policy(mut self, policy: FilePolicy) -> Self {
        self.set_file_policy(policy);
        self
    }

    pub fn set_file_policy(&mut self, policy: FilePolicy) {
        self.policy = policy;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    fn assert_new_name(&self, name: &str) {
        assert!(!name.is_empty(), "flag name must not be empty");
        assert!(name != "help", "flag name is reserved: help");
        let taken = self.entries.contains_key(name)
            || self.config_files.iter().any(|file| file.name == name);
        assert!(!taken, "flag redefined: {name}");
    }

    /// Declare a setting of any supported kind.
    ///
    /// `env` names the environment variable consulted when the flag is not
    /// given on the command line; pass `""` to skip the environment.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty, is `help`, or is already declared.
    pub fn declare<T: FlagValue>(
        &mut self,
        name: &str,
        default: T,
        env: &str,
        usage: &str,
    ) -> Setting<T> {
        self.assert_new_name(name);
        let setting = Setting::new(default.clone());
        self.entries.insert(
            name.to_string(),
            Entry {
                slot: T::into_slot(setting.clone()),
                env: env.to_string(),
                usage: usage.to_string(),
                default: (!default.is_zero()).then(|| default.format_flag()),
                source: Source::Default,
            },
        );
        setting
    }

    pub fn bool(&mut self, name: &str, default: bool, env: &str, usage: &str) -> Setting<bool> {
        self.declare(name, default, env, usage)
    }

    pub fn string(&mut self, name: &str, default: &str, env: &str, usage: &str) -> Setting<String> {
        self.declare(name, default.to_string(), env, usage)
    }

    pub fn int(&mut self, name: &str, default: isize, env: &str, usage: &str) -> Setting<isize> {
        self.declare(name, default, env, usage)
    }

    pub fn int64(&mut self, name: &str, default: i64, env: &str, usage: &str) -> Setting<i64> {
        self.declare(name, default, env, usage)
    }

    pub fn uint(&mut self, name: &str, default: usize, env: &str, usage: &str) -> Setting<usize> {
        self.declare(name, default, env, usage)
    }

    pub fn uint64(&mut self, name: &str, default: u64, env: &str, usage: &str) -> Setting<u64> {
        self.declare(name, default, env, usage)
    }

    pub fn float64(&mut self, name: &str, default: f64, env: &str, usage: &str) -> Setting<f64> {
        self.declare(name, default, env, usage)
    }

    pub fn duration(
        &mut self,
        name: &str,
        default: Duration,
        env: &str,
        usage: &str,
    ) -> Setting<Duration> {
        self.declare(name, default, env, usage)
    }

    /// Declare a flag carrying the path of a JSON configuration file.
    ///
    /// Files are applied in the order their flags were declared; an empty
    /// path means the file is simply absent.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`FlagfigSet::declare`].
    pub fn add_config_file(&mut self, name: &str, usage: &str) -> Setting<String> {
        self.assert_new_name(name);
        let path = Setting::new(String::new());
        self.config_files.push(ConfigFileFlag {
            name: name.to_string(),
            usage: usage.to_string(),
            path: path.clone(),
        });
        path
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.name.clone())
            .no_binary_name(true)
            .args_override_self(true);
        for file in &self.config_files {
            command = command.arg(
                Arg::new(file.name.clone())
                    .long(file.name.clone())
                    .help(file.usage.clone())
                    .value_name("PATH")
                    .action(ArgAction::Set),
            );
        }
        for (name, entry) in &self.entries {
            command = command.arg(entry.arg(name));
        }
        command.arg(
            Arg::new(REST_ARGS)
                .num_args(0..)
                .trailing_var_arg(true)
                .action(ArgAction::Append)
                .hide(true),
        )
    }

    /// Rendered usage text for every declared flag.
    pub fn usage(&self) -> String {
        self.command().render_help().to_string()
    }

    /// Parse `args` (without the program name), then resolve every setting
    /// the command line left unset from files and the environment.
    ///
    /// Errors are handled according to the set's [`ErrorHandling`].
    pub fn parse<I, T>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.try_parse(args) {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err),
        }
    }

    fn try_parse<I, T>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = self.with_long_dashes(args.into_iter().map(Into::into).collect());
        let matches = self.command().try_get_matches_from(args)?;
        self.parsed = true;

        for file in &self.config_files {
            if let Some(path) = matches.get_one::<String>(&file.name) {
                file.path.set(path.clone());
            }
        }

        self.explicit.clear();
        for (name, entry) in &mut self.entries {
            let given = matches.value_source(name) == Some(ValueSource::CommandLine);
            if given && entry.slot.capture(&matches, name) {
                entry.source = Source::CommandLine;
                self.explicit.insert(name.clone());
            }
        }

        self.args = matches
            .get_many::<String>(REST_ARGS)
            .map(|rest| rest.cloned().collect())
            .unwrap_or_default();

        self.collate()
    }

    fn is_flag_name(&self, name: &str) -> bool {
        name == "help"
            || self.entries.contains_key(name)
            || self.config_files.iter().any(|file| file.name == name)
    }

    /// Whether `name` reads its value from the following token when given
    /// without `=`.
    fn takes_separate_value(&self, name: &str) -> bool {
        match self.entries.get(name) {
            Some(entry) => entry.slot.kind() != Kind::Bool,
            None => self.config_files.iter().any(|file| file.name == name),
        }
    }

    /// Rewrite `-name` and `-name=value` to their `--` form for declared
    /// names. Stops at `--` or the first positional argument.
    fn with_long_dashes(&self, args: Vec<OsString>) -> Vec<OsString> {
        let mut out = Vec::with_capacity(args.len());
        let mut rest = args.into_iter();
        while let Some(arg) = rest.next() {
            let Some(text) = arg.to_str() else {
                out.push(arg);
                break;
            };
            if text == "--" || !text.starts_with('-') || text == "-" {
                out.push(arg);
                break;
            }
            let (body, long) = match text.strip_prefix("--") {
                Some(body) => (body, true),
                None => (&text[1..], false),
            };
            let (name, inline_value) = match body.split_once('=') {
                Some((name, _)) => (name, true),
                None => (body, false),
            };
            if !self.is_flag_name(name) {
                out.push(arg);
                continue;
            }
            let consumes_next = !inline_value && self.takes_separate_value(name);
            if long {
                out.push(arg);
            } else {
                out.push(OsString::from(format!("-{text}")));
            }
            if consumes_next {
                if let Some(value) = rest.next() {
                    out.push(value);
                }
            }
        }
        out.extend(rest);
        out
    }

    fn fail(&self, err: Error) -> Result<()> {
        match self.error_handling {
            ErrorHandling::ContinueOnError => Err(err),
            ErrorHandling::ExitOnError => match err {
                Error::Args(err) => err.exit(),
                other => {
                    eprintln!("{}: {other}", self.name);
                    std::process::exit(2)
                }
            },
            ErrorHandling::PanicOnError => panic!("{}: {err}", self.name),
        }
    }

    /// Fill every setting not given explicitly on the last parsed command
    /// line: configuration files first, then the environment.
    ///
    /// Files are read on the first call and reused afterwards.
    pub fn collate(&mut self) -> Result<()> {
        let pending: BTreeSet<String> = self
            .entries
            .keys()
            .filter(|name| !self.explicit.contains(*name))
            .cloned()
            .collect();

        let mut resolver = Resolver {
            policy: self.policy,
            env: self.env.as_ref(),
            diagnostics: &mut self.diagnostics,
        };
        if self.snapshots.is_none() {
            let paths: Vec<String> = self.config_files.iter().map(|file| file.path.get()).collect();
            self.snapshots = Some(resolver.load_files(&paths)?);
        }
        let snapshots = self.snapshots.as_deref().unwrap_or_default();
        resolver.apply_files(snapshots, &mut self.entries, &pending)?;
        resolver.apply_env(&mut self.entries, &pending)
    }

    /// Whether `parse` has completed its argument pass.
    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// Arguments remaining after the flags.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Whether `name` was given on the last parsed command line.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// Layer that supplied the current value of `name`.
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.entries.get(name).map(|entry| &entry.source)
    }

    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.entries.get(name).map(|entry| entry.slot.kind())
    }

    /// Current value of `name` in its flag text form.
    pub fn value_text(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|entry| entry.slot.display())
    }

    /// Declared setting names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Problems skipped during resolution under [`FilePolicy::Lenient`].
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Log each setting with its value and where it came from.
    pub fn log_summary(&self) {
        for (name, entry) in &self.entries {
            tracing::info!(
                set = %self.name,
                name = %name,
                kind = %entry.slot.kind(),
                value = %entry.slot.display(),
                source = %entry.source,
                "resolved setting"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MockEnv;

    fn flags() -> FlagfigSet {
        FlagfigSet::new("test", ErrorHandling::ContinueOnError).with_env_source(MockEnv::new())
    }

    #[test]
    fn parse_captures_explicit_values_and_rest() {
        let mut f = flags();
        assert!(!f.parsed());
        let name = f.string("string", "0", "ENV_NAME", "string value");
        f.parse(["--string", "hello", "one-extra-argument"]).unwrap();

        assert!(f.parsed());
        assert_eq!(name.get(), "hello");
        assert_eq!(f.args(), ["one-extra-argument"]);
        assert!(f.is_explicit("string"));
        assert_eq!(f.source("string"), Some(&Source::CommandLine));
    }

    #[test]
    fn untouched_settings_keep_defaults() {
        let mut f = flags();
        let count = f.int("count", 1, "", "count");
        let ratio = f.float64("ratio", 0.5, "", "ratio");
        f.parse(Vec::<String>::new()).unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(ratio.get(), 0.5);
        assert_eq!(f.source("count"), Some(&Source::Default));
        assert!(f.diagnostics().is_empty());
    }

    #[test]
    fn bool_flag_without_value_is_true() {
        let mut f = flags();
        let verbose = f.bool("verbose", false, "", "chatty");
        let color = f.bool("color", true, "", "colour output");
        f.parse(["--verbose", "--color=false", "file.txt"]).unwrap();

        assert!(verbose.get());
        assert!(!color.get());
        assert_eq!(f.args(), ["file.txt"]);
    }

    #[test]
    fn negative_numbers_are_values() {
        let mut f = flags();
        let offset = f.int64("offset", 0, "", "offset");
        f.parse(["--offset", "-5"]).unwrap();
        assert_eq!(offset.get(), -5);
    }

    #[test]
    fn single_dash_names_are_accepted() {
        let mut f = flags();
        let name = f.string("name", "default", "", "name");
        let verbose = f.bool("verbose", false, "", "chatty");
        let count = f.int("count", 0, "", "count");
        f.parse(["-name=explicit", "-verbose", "-count", "-3", "rest", "-count=9"])
            .unwrap();

        assert_eq!(name.get(), "explicit");
        assert!(verbose.get());
        assert_eq!(count.get(), -3);
        assert!(f.is_explicit("name"));
        assert_eq!(f.args(), ["rest", "-count=9"]);
    }

    #[test]
    fn single_dash_value_in_next_token() {
        let mut f = flags();
        let name = f.string("string", "0", "", "string value");
        f.add_config_file("config", "config file");
        f.parse(["-string", "hello", "-config", ""]).unwrap();
        assert_eq!(name.get(), "hello");
        assert!(f.args().is_empty());
    }

    #[test]
    fn single_dash_unknown_name_is_an_args_error() {
        let mut f = flags();
        f.string("name", "", "", "name");
        let err = f.parse(["-nmae=typo"]).unwrap_err();
        assert!(matches!(err, Error::Args(_)), "got {err:?}");
    }

    #[test]
    fn repeated_flag_keeps_the_last_value() {
        let mut f = flags();
        let name = f.string("name", "", "", "name");
        let verbose = f.bool("verbose", false, "", "chatty");
        f.parse(["--name=a", "-verbose", "--name=b", "-verbose=false"]).unwrap();
        assert_eq!(name.get(), "b");
        assert!(!verbose.get());
    }

    #[test]
    fn bare_dash_is_positional() {
        let mut f = flags();
        let verbose = f.bool("verbose", false, "", "chatty");
        f.parse(["-", "-verbose"]).unwrap();
        assert!(!verbose.get());
        assert_eq!(f.args(), ["-", "-verbose"]);
    }

    #[test]
    fn double_dash_ends_flags() {
        let mut f = flags();
        let verbose = f.bool("verbose", false, "", "chatty");
        f.parse(["--", "--verbose"]).unwrap();
        assert!(!verbose.get());
        assert_eq!(f.args(), ["--verbose"]);
    }

    #[test]
    fn unknown_flag_is_an_args_error() {
        let mut f = flags();
        f.string("known", "", "", "known");
        let err = f.parse(["--unknown=1"]).unwrap_err();
        assert!(matches!(err, Error::Args(_)), "got {err:?}");
    }

    #[test]
    fn invalid_flag_value_is_an_args_error() {
        let mut f = flags();
        f.uint("workers", 4, "", "workers");
        let err = f.parse(["--workers=many"]).unwrap_err();
        assert!(matches!(err, Error::Args(_)), "got {err:?}");
    }

    #[test]
    #[should_panic(expected = "flag redefined: host")]
    fn duplicate_name_panics() {
        let mut f = flags();
        f.string("host", "", "", "first");
        f.string("host", "", "", "second");
    }

    #[test]
    #[should_panic(expected = "flag redefined: config")]
    fn config_file_name_clashes_with_setting() {
        let mut f = flags();
        f.add_config_file("config", "config file");
        f.bool("config", false, "", "oops");
    }

    #[test]
    #[should_panic(expected = "flag name must not be empty")]
    fn empty_name_panics() {
        flags().int("", 0, "", "nameless");
    }

    #[test]
    #[should_panic(expected = "bad")]
    fn panic_mode_panics_on_errors() {
        let mut f = FlagfigSet::new("bad", ErrorHandling::PanicOnError);
        let _ = f.parse(["--nope"]);
    }

    #[test]
    fn usage_lists_flags_defaults_and_env() {
        let mut f = flags();
        f.duration("timeout", Duration::from_secs(30), "APP_TIMEOUT", "request timeout");
        f.string("host", "", "", "database host");
        f.add_config_file("config", "config file path");

        let usage = f.usage();
        assert!(usage.contains("--timeout"), "{usage}");
        assert!(usage.contains("(default: 30s)"), "{usage}");
        assert!(usage.contains("[env: APP_TIMEOUT]"), "{usage}");
        assert!(usage.contains("--config"), "{usage}");
        assert!(!usage.contains("(default: \"\")"), "{usage}");
    }

    #[test]
    fn introspection_reports_kinds_and_values() {
        let mut f = flags();
        f.uint64("max-bytes", 1024, "", "limit");
        f.duration("interval", Duration::from_millis(1500), "", "tick");
        f.parse(Vec::<String>::new()).unwrap();

        assert_eq!(f.kind("max-bytes"), Some(Kind::Uint64));
        assert_eq!(f.kind("missing"), None);
        assert_eq!(f.value_text("interval").as_deref(), Some("1.5s"));
        assert_eq!(f.names().collect::<Vec<_>>(), ["interval", "max-bytes"]);
    }
}
