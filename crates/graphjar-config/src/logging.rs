use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::CONFIG_TARGET;

static TRACING_INIT: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level for all graphjar crates, or a full `EnvFilter` directive
    /// string such as `graphjar.binary=trace,info`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn directives(&self) -> &str {
        match self.level.trim() {
            "" => "info",
            level => level,
        }
    }

    /// The effective filter: `level` followed by `RUST_LOG`, when set.
    /// Unparsable directives fall back to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        let mut directives = self.directives().to_owned();
        if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
            let env = env.trim();
            if !env.is_empty() {
                directives.push(',');
                directives.push_str(env);
            }
        }
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// Only the first call installs anything. Returns `false` when another
/// subscriber was already installed by the host application.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();
        if installed {
            tracing::debug!(
                target: CONFIG_TARGET,
                level = %config.level,
                json = config.json,
                "tracing initialized"
            );
        }
    });
    installed
}
