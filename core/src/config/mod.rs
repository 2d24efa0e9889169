//! Application configuration management

use anyhow::anyhow;
use std::fs;
use std::path::PathBuf;

pub mod app_config;

pub use app_config::{AppConfig, HomePanelsSettings};

/// Platform-specific data directory resolution
pub fn default_data_dir() -> crate::common::Result<PathBuf> {
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("hearth");

	fs::create_dir_all(&dir)?;

	Ok(dir)
}
