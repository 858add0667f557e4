//! Tracing subscriber setup for the backup binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_JSON_VAR: &str = "MEALIE_BACKUP_LOG_JSON";

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// One JSON object per line, for log collectors.
    pub json: bool,
}

impl LogConfig {
    /// Reads the output format from the environment.
    ///
    /// Logging starts before the main configuration is resolved so that
    /// configuration errors are reported through the same subscriber.
    pub fn from_env() -> Self {
        let json = std::env::var(LOG_JSON_VAR)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Self { json }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::is_truthy;

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "json"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}
