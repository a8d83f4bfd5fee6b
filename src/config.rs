//! `vpad.toml` settings for the manager.

use crate::dinput::Charset;
use crate::input::{DeadzoneFilter, InputFilter};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const CONFIG_FILE: &str = "vpad.toml";

/// Largest number of virtual devices a manager will serve
pub const MAX_DEVICES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSourceKind {
    /// Real controllers, bound by the assignment manager
    #[default]
    Physical,
    /// Inputs submitted over the control socket
    Feed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadzoneConfig {
    pub enabled: bool,
    pub threshold: f32,
}

impl Default for DeadzoneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing filter, `RUST_LOG` takes precedence
    pub log_level: String,
    pub device_count: usize,
    pub source: InputSourceKind,
    pub scan_interval_ms: u64,
    pub charset: Charset,
    pub dpad_override: bool,
    pub deadzone: DeadzoneConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            device_count: 2,
            source: InputSourceKind::default(),
            scan_interval_ms: 250,
            charset: Charset::default(),
            dpad_override: false,
            deadzone: DeadzoneConfig::default(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, writing the defaults there first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let text = toml::to_string_pretty(&config).context("Failed to serialize default config")?;
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DEVICES).contains(&self.device_count) {
            anyhow::bail!("device_count must be between 1 and {}, got {}", MAX_DEVICES, self.device_count);
        }
        if !(0.0..=1.0).contains(&self.deadzone.threshold) {
            anyhow::bail!("deadzone.threshold must be within [0, 1], got {}", self.deadzone.threshold);
        }
        if self.scan_interval_ms == 0 {
            anyhow::bail!("scan_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn filter(&self) -> InputFilter {
        InputFilter {
            dpad_override: self.dpad_override,
            deadzone: self.deadzone.enabled.then_some(DeadzoneFilter {
                threshold: self.deadzone.threshold,
            }),
        }
    }
}
