//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use workers_ai::{DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};

/// Default directory for world records.
pub const DEFAULT_SAVE_DIR: &str = "saves";

/// Default pause before showing recipe and placeholder results.
pub const DEFAULT_PRESENTATION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidDelay { var: &'static str, value: String },
}

/// Configuration for a [`GameSession`](crate::GameSession).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Workers AI token. Without it every generation falls back locally.
    pub api_key: Option<String>,
    /// Cloudflare account owning the models.
    pub account_id: Option<String>,
    pub text_model: String,
    pub image_model: String,
    /// API base URL; point it at a proxy to keep the token off the client.
    pub api_base: String,
    /// Directory holding the world record.
    pub save_dir: PathBuf,
    pub presentation_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            account_id: None,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            presentation_delay: DEFAULT_PRESENTATION_DELAY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    ///
    /// Unset or empty variables keep their defaults. Missing credentials
    /// are not an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get("CLOUDFLARE_API_KEY");
        config.account_id = get("CLOUDFLARE_ACCOUNT_ID");
        if let Some(model) = get("GENESIS_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(model) = get("GENESIS_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(base) = get("GENESIS_API_BASE") {
            config.api_base = base;
        }
        if let Some(dir) = get("GENESIS_SAVE_DIR") {
            config.save_dir = PathBuf::from(dir);
        }
        if let Some(ms) = get("GENESIS_PRESENTATION_DELAY_MS") {
            let millis = ms
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidDelay {
                    var: "GENESIS_PRESENTATION_DELAY_MS",
                    value: ms.clone(),
                })?;
            config.presentation_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }

    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        self.api_key = Some(api_key.into());
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_presentation_delay(mut self, delay: Duration) -> Self {
        self.presentation_delay = delay;
        self
    }

    /// Whether both credentials are present.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.account_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(!config.has_credentials());
        assert_eq!(config.text_model, "@cf/meta/llama-3-8b-instruct");
        assert_eq!(config.presentation_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_reads_variables() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("CLOUDFLARE_API_KEY", "token"),
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("GENESIS_TEXT_MODEL", "@cf/custom"),
            ("GENESIS_SAVE_DIR", "/tmp/worlds"),
            ("GENESIS_PRESENTATION_DELAY_MS", "0"),
        ]))
        .unwrap();

        assert!(config.has_credentials());
        assert_eq!(config.text_model, "@cf/custom");
        assert_eq!(config.save_dir, PathBuf::from("/tmp/worlds"));
        assert!(config.presentation_delay.is_zero());
    }

    #[test]
    fn test_empty_values_ignored() {
        let config =
            EngineConfig::from_lookup(lookup(&[("CLOUDFLARE_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_bad_delay_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("GENESIS_PRESENTATION_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_credentials("k", "a")
            .with_save_dir("/w")
            .with_presentation_delay(Duration::ZERO);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.save_dir, PathBuf::from("/w"));
    }
}
