//! Logging initialization

use crate::common::errors::Result;
use anyhow::anyhow;
use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[cfg(debug_assertions)]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::INFO;

/// Install the global tracing subscriber: a console layer filtered by
/// `RUST_LOG` (falling back to `default_directive`) and a daily-rolling
/// file layer under `<data_dir>/logs`.
///
/// The returned guard must outlive the process' logging; dropping it loses
/// buffered log lines.
pub fn init(data_dir: &Path, default_directive: &str) -> Result<WorkerGuard> {
	let (non_blocking, guard) =
		tracing_appender::non_blocking(rolling::daily(data_dir.join("logs"), "hearth.log"));

	let directive = default_directive
		.parse()
		.map_err(|e| anyhow!("invalid tracing directive {default_directive:?}: {e}"))?;

	tracing_subscriber::registry()
		.with(EnvFilter::from_default_env().add_directive(directive))
		.with(fmt::layer().with_filter(CONSOLE_LOG_FILTER))
		.with(
			fmt::Layer::default()
				.with_writer(non_blocking)
				.with_ansi(false)
				.with_filter(LevelFilter::DEBUG),
		)
		.init();

	Ok(guard)
}
