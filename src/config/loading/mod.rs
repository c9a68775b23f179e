mod file_creation;

use std::{fs, path::Path};

use file_creation::create_default_config_file;
use tracing::{debug, info};

use super::Config;
use crate::{CastlinkError, Result};

/// Set to `1` when firmware must be loaded before P2P is usable.
pub const NEED_FIRMWARE_ENV: &str = "CASTLINK_NEED_FIRMWARE";
/// Names the interface the supplicant should create for P2P.
pub const DEDICATED_INTERFACE_ENV: &str = "CASTLINK_DEDICATED_P2P_INTERFACE";

impl Config {
    /// Loads the configuration file at `path`, creating a commented
    /// default file when there is none, and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be created or read
    /// - The TOML content is invalid
    /// - A section does not match the schema
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            info!("Creating default configuration at {}", path.display());
            create_default_config_file(path)?;
        }

        let content = fs::read_to_string(path).map_err(|e| CastlinkError::io_at(e, path))?;
        let mut config = Self::from_toml(&content, Some(path))?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or does not match the
    /// schema
    pub fn from_toml(content: &str, path: Option<&Path>) -> Result<Config> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| CastlinkError::toml_parse(e, path))?;

        value
            .try_into()
            .map_err(|e| CastlinkError::ConfigValidation {
                component: "config parsing".to_string(),
                details: format!("Configuration validation failed: {e}"),
            })
    }

    /// Applies `CASTLINK_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub(crate) fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(value) = var(NEED_FIRMWARE_ENV) {
            self.p2p.needs_firmware = value.trim() == "1";
            debug!("{NEED_FIRMWARE_ENV}={value}");
        }

        if let Some(ifname) = var(DEDICATED_INTERFACE_ENV).filter(|name| !name.trim().is_empty()) {
            debug!("{DEDICATED_INTERFACE_ENV}={ifname}");
            self.p2p.dedicated_interface = Some(ifname.trim().to_string());
        }
    }
}
