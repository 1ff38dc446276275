//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Serialized random forest artifact
    pub model_path: PathBuf,

    /// Optional JSON feature schema replacing the built-in one
    pub schema_path: Option<PathBuf>,

    /// Remote global-importance plot
    pub reference_image_url: String,

    /// Timeout applied to the reference image fetch
    pub image_fetch_timeout_secs: u64,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_PORT,
            model_path: PathBuf::from(constants::DEFAULT_MODEL_PATH),
            schema_path: None,
            reference_image_url: constants::DEFAULT_REFERENCE_IMAGE_URL.to_string(),
            image_fetch_timeout_secs: constants::DEFAULT_IMAGE_FETCH_TIMEOUT_SECS,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: lookup("MODEL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            schema_path: lookup("SCHEMA_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            reference_image_url: lookup("REFERENCE_IMAGE_URL")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.reference_image_url),

            image_fetch_timeout_secs: lookup("IMAGE_FETCH_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.image_fetch_timeout_secs),

            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    pub fn image_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.image_fetch_timeout_secs)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
