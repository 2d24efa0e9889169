//! Application configuration

use super::default_data_dir;
use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILE: &str = "hearth.json";
const CONFIG_VERSION: u32 = 1;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Default logging directive when `RUST_LOG` is unset
	pub log_level: String,

	/// Home panels service configuration
	#[serde(default)]
	pub home_panels: HomePanelsSettings,
}

/// Tunables for the home panels service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomePanelsSettings {
	/// Quiet period after the last panel change before pending changes are
	/// applied, in milliseconds
	pub invalidation_delay_ms: u64,

	/// Bounded wait for panel info lookups during a refresh pass, in
	/// milliseconds
	pub panel_info_timeout_ms: u64,

	/// Capacity of the inbound engine message channel
	pub event_channel_capacity: usize,
}

impl Default for HomePanelsSettings {
	fn default() -> Self {
		Self {
			invalidation_delay_ms: 500,
			panel_info_timeout_ms: 1000,
			event_channel_capacity: 64,
		}
	}
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self> {
		let data_dir = default_data_dir()?;
		Self::load_from(&data_dir)
	}

	/// Load configuration from a specific data directory, creating a
	/// default config file when none exists yet
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let config: AppConfig = serde_json::from_str(&json)?;

			if config.version > CONFIG_VERSION {
				warn!(
					"Config v{} is newer than supported v{}, proceeding anyway",
					config.version, CONFIG_VERSION
				);
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: CONFIG_VERSION,
			data_dir,
			log_level: "hearth_core=debug".to_string(),
			home_panels: HomePanelsSettings::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Get the path for the logs directory
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Get the path of the persisted home panel configuration
	pub fn home_config_path(&self) -> PathBuf {
		self.data_dir.join("home_panels.json")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_default_config_is_created_and_reloaded() {
		let dir = TempDir::new().unwrap();

		let config = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(config.version, CONFIG_VERSION);
		assert_eq!(config.home_panels.invalidation_delay_ms, 500);
		assert_eq!(config.home_panels.panel_info_timeout_ms, 1000);
		assert!(dir.path().join(CONFIG_FILE).exists());

		let reloaded = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(reloaded.data_dir, config.data_dir);
		assert_eq!(reloaded.log_level, config.log_level);
	}

	#[test]
	fn test_settings_survive_roundtrip() {
		let dir = TempDir::new().unwrap();

		let mut config = AppConfig::default_with_dir(dir.path().to_path_buf());
		config.home_panels.invalidation_delay_ms = 25;
		config.save().unwrap();

		let reloaded = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(reloaded.home_panels.invalidation_delay_ms, 25);
	}
}
