use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::reconcile::InvalidationPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

/// Balance reconciler policy
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Fate of a pre-consensus credit whose transfer is later invalidated
    #[serde(default)]
    pub invalidation_policy: InvalidationPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "reconciler.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_app_config_deserialize() {
        let yaml = r#"
log_level: "debug"
log_dir: "./logs"
log_file: "wallet.log"
use_json: true
rotation: "hourly"
reconciler:
  invalidation_policy: claw_back
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level, "debug");
        assert!(config.use_json);
        assert_eq!(
            config.reconciler.invalidation_policy,
            InvalidationPolicy::ClawBack
        );
    }

    #[test]
    fn test_reconciler_section_optional() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "wallet.log"
use_json: false
rotation: "never"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.reconciler, ReconcilerConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_level: warn\nlog_dir: /tmp\nlog_file: r.log\nuse_json: false\nrotation: daily"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = AppConfig::from_file("/nonexistent/reconciler.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
