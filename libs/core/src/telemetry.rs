use std::env;
use std::sync::OnceLock;

use anyhow::Result;
use tracing_subscriber::layer::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub json_logs: bool,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "toybox".into(),
            json_logs: false,
            default_filter: "info".into(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name = env::var("TOYBOX_SERVICE_NAME")
            .unwrap_or_else(|_| default_service_name.to_string());
        let json_logs = env::var("LOG_FORMAT")
            .map(|v| parse_json_logs(&v))
            .unwrap_or(false);
        Self {
            service_name,
            json_logs,
            ..Self::default()
        }
    }
}

fn parse_json_logs(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "text" | "pretty" | "plain" | ""
    )
}

/// Installs the global tracing subscriber. Later calls are ignored.
pub fn init_tracing(cfg: &TelemetryConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let fmt_layer = if cfg.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.default_filter.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();
    tracing::info!(service = %cfg.service_name, "tracing initialised");

    INIT.set(()).ok();
    Ok(())
}
