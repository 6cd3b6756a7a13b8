//! Configuration loader with multi-source merging

use crate::HarnessConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "FAULTLINE".to_string(),
        }
    }

    /// Set the project directory searched for `faultline.toml`.
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "FAULTLINE").
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence.
    pub fn load(self) -> Result<HarnessConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = HarnessConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Project config (faultline.toml)
        let project_file = self.project_dir.join("faultline.toml");
        if project_file.exists() {
            builder = builder.add_source(
                config::File::from(project_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Environment variables (FAULTLINE_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder.build().context("Failed to build configuration")?;

        let config: HarnessConfig = merged
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Load configuration or return defaults if loading fails.
    pub fn load_or_default(self) -> HarnessConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
