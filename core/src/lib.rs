//! Hearth core
//!
//! Embeddable home-screen backend for the Hearth mobile browser. The
//! embedding layer bridges named engine messages in and out of the core;
//! the core owns home panel configuration, its persistence, and the
//! coalescing machinery that keeps it current.

pub mod common;
pub mod config;
pub mod home;
pub mod infra;
pub mod service;

pub use common::errors::{CoreError, Result};

use crate::config::AppConfig;
use crate::home::panel_info::EnginePanelInfoClient;
use crate::home::store::{HomeConfigStore, JsonFileBackend};
use crate::infra::engine::{EngineBridge, EngineMessage};
use crate::infra::event::{Event, EventBus};
use crate::service::home_panels::HomePanelsService;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// A running core instance. Constructed once at application start-up and
/// torn down at shutdown; collaborators hold handles to it rather than
/// reaching through globals.
pub struct Core {
	pub config: AppConfig,
	pub events: Arc<EventBus>,
	pub bridge: Arc<EngineBridge>,
	pub home_panels: HomePanelsService,
}

impl Core {
	/// Load configuration from `data_dir` and start the core services.
	///
	/// Returns the core and the receiver the embedder drains to deliver
	/// outbound messages to the engine. Must be called from within a
	/// tokio runtime.
	pub fn new(
		data_dir: impl AsRef<Path>,
	) -> Result<(Self, mpsc::UnboundedReceiver<EngineMessage>)> {
		let config = AppConfig::load_from(data_dir.as_ref())?;
		Ok(Self::with_config(config))
	}

	/// Start the core services with an explicit configuration.
	pub fn with_config(config: AppConfig) -> (Self, mpsc::UnboundedReceiver<EngineMessage>) {
		let events = Arc::new(EventBus::new());
		let (bridge, outbound_rx) = EngineBridge::new(config.home_panels.event_channel_capacity);

		let store = HomeConfigStore::new(
			Arc::new(JsonFileBackend::new(config.home_config_path())),
			events.clone(),
		);
		let panel_info = Arc::new(EnginePanelInfoClient::new(bridge.clone()));
		let home_panels = HomePanelsService::spawn(
			store,
			bridge.clone(),
			panel_info,
			events.clone(),
			config.home_panels.clone(),
		);

		events.emit(Event::CoreStarted);
		info!(data_dir = %config.data_dir.display(), "core started");

		(
			Self {
				config,
				events,
				bridge,
				home_panels,
			},
			outbound_rx,
		)
	}

	/// Stop all services, flushing pending panel changes.
	pub async fn shutdown(self) {
		self.home_panels.shutdown().await;
		self.events.emit(Event::CoreShutdown);
		info!("core stopped");
	}
}
