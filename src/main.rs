mod logging;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use flagfig::{ConfigurableConfig, ErrorHandling, FlagfigSet, Nester, Setting};
use serde_json::{Map, Value, json};

/// HTTP listener settings.
#[derive(Default)]
struct HttpConfig {
    addr: Option<Setting<String>>,
    read_timeout: Option<Setting<Duration>>,
    tls_cert: Option<Setting<String>>,
    tls_key: Option<Setting<String>>,
    tls: bool,
}

impl Nester for HttpConfig {
    fn register_flags(&mut self, flags: &mut FlagfigSet) {
        self.addr = Some(flags.string(
            "http-addr",
            "127.0.0.1:8080",
            "DEMO_HTTP_ADDR",
            "listen address",
        ));
        self.read_timeout = Some(flags.duration(
            "read-timeout",
            Duration::from_secs(30),
            "DEMO_READ_TIMEOUT",
            "request read timeout",
        ));
        self.tls_cert =
            Some(flags.string("tls-cert", "", "DEMO_TLS_CERT", "path to the TLS certificate"));
        self.tls_key =
            Some(flags.string("tls-key", "", "DEMO_TLS_KEY", "path to the TLS private key"));
    }

    fn after_parsed(&mut self) -> Result<()> {
        let cert = self.tls_cert.as_ref().map(Setting::get).unwrap_or_default();
        let key = self.tls_key.as_ref().map(Setting::get).unwrap_or_default();
        if cert.is_empty() != key.is_empty() {
            bail!("tls-cert and tls-key must be set together");
        }
        self.tls = !cert.is_empty();
        Ok(())
    }
}

/// One database connection; instantiated per role under its own names.
struct DatabaseConfig {
    url_conf: ConfigurableConfig,
    pool_conf: ConfigurableConfig,
    url: Option<Setting<String>>,
    pool_size: Option<Setting<usize>>,
}

impl DatabaseConfig {
    fn new(role: &str) -> Self {
        let env_role = role.to_ascii_uppercase();
        Self {
            url_conf: ConfigurableConfig::new(
                format!("{role}-db-url"),
                format!("DEMO_{env_role}_DB_URL"),
            ),
            pool_conf: ConfigurableConfig::new(
                format!("{role}-db-pool"),
                format!("DEMO_{env_role}_DB_POOL"),
            ),
            url: None,
            pool_size: None,
        }
    }
}

impl Nester for DatabaseConfig {
    fn register_flags(&mut self, flags: &mut FlagfigSet) {
        self.url = Some(flags.string(
            &self.url_conf.flag_name,
            "",
            &self.url_conf.env_name,
            "database connection url",
        ));
        self.pool_size = Some(flags.uint(
            &self.pool_conf.flag_name,
            8,
            &self.pool_conf.env_name,
            "connection pool size",
        ));
    }

    fn after_parsed(&mut self) -> Result<()> {
        if self.pool_size.as_ref().map(Setting::get) == Some(0) {
            bail!("{} must be at least 1", self.pool_conf.flag_name);
        }
        Ok(())
    }
}

/// Top-level configuration; forwards both hooks to its groups.
struct DemoConfig {
    http: HttpConfig,
    primary: DatabaseConfig,
    replica: DatabaseConfig,
    verbose: Option<Setting<bool>>,
}

impl Nester for DemoConfig {
    fn register_flags(&mut self, flags: &mut FlagfigSet) {
        flags.add_config_file("config", "path to the base JSON config file");
        flags.add_config_file("local-config", "path to a JSON file overriding --config");
        self.verbose = Some(flags.bool(
            "verbose",
            false,
            "DEMO_VERBOSE",
            "print every resolved setting",
        ));
        self.http.register_flags(flags);
        self.primary.register_flags(flags);
        self.replica.register_flags(flags);
    }

    fn after_parsed(&mut self) -> Result<()> {
        self.http.after_parsed().context("http settings")?;
        self.primary.after_parsed().context("primary database settings")?;
        self.replica.after_parsed().context("replica database settings")?;
        Ok(())
    }
}

fn report(flags: &FlagfigSet) -> Value {
    let settings: Map<String, Value> = flags
        .names()
        .map(|name| {
            let entry = json!({
                "kind": flags.kind(name),
                "value": flags.value_text(name),
                "source": flags.source(name),
            });
            (name.to_string(), entry)
        })
        .collect();
    json!({
        "settings": settings,
        "args": flags.args(),
        "diagnostics": flags.diagnostics(),
    })
}

fn main() -> Result<()> {
    logging::init_logging()?;

    let mut config = DemoConfig {
        http: HttpConfig::default(),
        primary: DatabaseConfig::new("primary"),
        replica: DatabaseConfig::new("replica"),
        verbose: None,
    };
    let flags = flagfig::parse_nested_into(
        FlagfigSet::new("flagfig-demo", ErrorHandling::ExitOnError),
        &mut [&mut config],
        std::env::args_os().skip(1),
    )?;

    if !flags.diagnostics().is_empty() {
        tracing::warn!(count = flags.diagnostics().len(), "some configuration values were skipped");
    }
    if config.verbose.as_ref().is_some_and(Setting::get) {
        flags.log_summary();
    }

    tracing::info!(
        http_addr = %config.http.addr.as_ref().map(Setting::get).unwrap_or_default(),
        tls = config.http.tls,
        primary_db = config.primary.url.as_ref().is_some_and(|url| !url.read().is_empty()),
        replica_db = config.replica.url.as_ref().is_some_and(|url| !url.read().is_empty()),
        "configuration ready"
    );

    let rendered = serde_json::to_string_pretty(&report(&flags)).context("serialize report")?;
    println!("{rendered}");
    Ok(())
}
