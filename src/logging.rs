use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Clone, Copy, Debug)]
enum LogProfile {
    Dev,
    User,
    All,
}

pub fn init_logging() -> Result<()> {
    let profile = resolve_profile();
    let filter_spec = resolve_filter_spec(profile);

    let env_filter = EnvFilter::try_new(filter_spec.clone())
        .with_context(|| format!("invalid log filter: {filter_spec}"))?;

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to initialize tracing subscriber")?;

    tracing::debug!(profile = ?profile, filter = %filter_spec, "logging initialized");
    Ok(())
}

fn resolve_profile() -> LogProfile {
    if let Ok(raw) = std::env::var("FLAGFIG_LOG_PROFILE") {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" => return LogProfile::Dev,
            "user" => return LogProfile::User,
            "all" => return LogProfile::All,
            _ => {}
        }
    }

    if cfg!(debug_assertions) {
        LogProfile::Dev
    } else {
        LogProfile::User
    }
}

fn resolve_filter_spec(profile: LogProfile) -> String {
    for key in ["RUST_LOG", "FLAGFIG_LOG"] {
        if let Ok(raw) = std::env::var(key) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    match profile {
        LogProfile::Dev => "info,flagfig=debug,flagfig_demo=debug".to_string(),
        LogProfile::User => "warn,flagfig_demo=info".to_string(),
        LogProfile::All => "trace".to_string(),
    }
}
