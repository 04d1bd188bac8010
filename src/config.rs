use std::env;

use crate::classifier::BoundsMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Bounds mode used when a request does not choose one
    pub bounds_mode: BoundsMode,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bounds_mode = match env::var("BOUNDS_MODE") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "BOUNDS_MODE",
                    value,
                })?,
            Err(_) => BoundsMode::CapacityTable,
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            bounds_mode,
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| "26214400".to_string())
                .parse()
                .unwrap_or(25 * 1024 * 1024),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            bounds_mode: BoundsMode::CapacityTable,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}
