use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::interpreter::DEFAULT_CLASS_NAMES;

pub const CONFIG_PATH_VAR: &str = "LEAFSCAN_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub workers: Option<usize>,
    pub class_names: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            model_path: PathBuf::from("plant_disease_model.pt"),
            static_dir: Some(PathBuf::from("static")),
            max_upload_bytes: 50 * 1024 * 1024,
            workers: None,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the YAML file named by `LEAFSCAN_CONFIG`, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path, source })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("BIND_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_value("PORT", port)?;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model_path = PathBuf::from(model_path);
        }
        if let Some(static_dir) = lookup("STATIC_DIR") {
            self.static_dir = (!static_dir.is_empty()).then(|| PathBuf::from(static_dir));
        }
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_value("MAX_UPLOAD_BYTES", max)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
