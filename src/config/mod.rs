// ============================================================
// Layer 0 — Application Configuration
// ============================================================
// Layered settings, later sources win:
//   1. built-in defaults
//   2. config/default.toml
//   3. config/local.toml
//   4. environment, e.g. CHURN__SERVER__PORT=9000
//
// Command-line flags override these per invocation.

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::prediction::{ModelKind, DEFAULT_THRESHOLD};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server:  ServerConfig,
    pub logging: LoggingConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level:  String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Defaults for the predict command and the web demo.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub model_dir: PathBuf,
    pub model:     ModelKind,
    pub threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level:  "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("data/models"),
            model:     ModelKind::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CHURN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
        assert_eq!(cfg.scoring.model, ModelKind::Gbt);
        assert_eq!(cfg.scoring.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_partial_sources_keep_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[scoring]\nmodel = \"logreg\"\n[logging]\nformat = \"json\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.scoring.model, ModelKind::Logreg);
        assert_eq!(cfg.scoring.threshold, DEFAULT_THRESHOLD);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.server.host, "127.0.0.1");
    }
}
