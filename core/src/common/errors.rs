//! Unified error handling for the core

use thiserror::Error;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum CoreError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Engine bridge closed")]
	BridgeClosed,

	#[error("Service stopped: {0}")]
	ServiceStopped(&'static str),

	#[error("Other error: {0}")]
	Other(#[from] anyhow::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
