//! Logging pipeline for the bootstrap binary.
//!
//! Logs go to stderr so command output on stdout stays machine readable.

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flashscore_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(&settings.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    tracing::debug!(
        target: "flashscore-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = normalize_level(level)?;
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

fn normalize_level(level: &str) -> anyhow::Result<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        _ => Err(anyhow::anyhow!("invalid log level: {level}")),
    }
}
