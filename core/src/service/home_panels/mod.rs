//! Home panels configuration service
//!
//! Listens for panel install/uninstall/update and dataset refresh messages
//! from the engine, coalesces them into batches, and applies them to the
//! home configuration store. One worker task owns the pending queue, the
//! invalidation timer, and all store access; everything else talks to it
//! through the command channel.

mod metrics;
mod worker;

pub use metrics::HomePanelsMetrics;

use crate::common::errors::{CoreError, Result};
use crate::config::HomePanelsSettings;
use crate::home::panel::PanelConfig;
use crate::home::panel_info::PanelInfoSource;
use crate::home::store::HomeConfigStore;
use crate::infra::engine::{
	EngineBridge, EngineMessage, MSG_HOME_PANELS_INSTALL, MSG_HOME_PANELS_REFRESH,
	MSG_HOME_PANELS_UNINSTALL, MSG_HOME_PANELS_UPDATE,
};
use crate::infra::event::EventBus;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use worker::HomePanelsWorker;

/// Engine messages the service subscribes to
const HANDLED_MESSAGES: [&str; 4] = [
	MSG_HOME_PANELS_INSTALL,
	MSG_HOME_PANELS_UNINSTALL,
	MSG_HOME_PANELS_UPDATE,
	MSG_HOME_PANELS_REFRESH,
];

/// Commands marshalled onto the worker task
#[derive(Debug)]
pub(crate) enum Command {
	EngineMessage(EngineMessage),
	LocaleReady(String),
	QueryPanels(oneshot::Sender<Vec<PanelConfig>>),
	Shutdown,
}

/// Clonable entry point for talking to the service
#[derive(Debug, Clone)]
pub struct HomePanelsHandle {
	tx: mpsc::UnboundedSender<Command>,
}

impl HomePanelsHandle {
	/// Notify the service that the application locale is known. A change
	/// against the stored locale triggers an immediate refresh.
	pub fn locale_ready(&self, locale: impl Into<String>) {
		let _ = self.tx.send(Command::LocaleReady(locale.into()));
	}

	/// Current panel set as the store sees it.
	pub async fn query_panels(&self) -> Result<Vec<PanelConfig>> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(Command::QueryPanels(reply_tx))
			.map_err(|_| CoreError::ServiceStopped("home panels"))?;

		reply_rx
			.await
			.map_err(|_| CoreError::ServiceStopped("home panels"))
	}
}

/// Running service instance
pub struct HomePanelsService {
	handle: HomePanelsHandle,
	metrics: Arc<HomePanelsMetrics>,
	worker_task: JoinHandle<()>,
	forwarder_task: JoinHandle<()>,
}

impl HomePanelsService {
	/// Spawn the coalescing worker and the bridge forwarder feeding it.
	pub fn spawn(
		store: HomeConfigStore,
		bridge: Arc<EngineBridge>,
		panel_info: Arc<dyn PanelInfoSource>,
		events: Arc<EventBus>,
		settings: HomePanelsSettings,
	) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let metrics = Arc::new(HomePanelsMetrics::new());

		let forwarder_task = tokio::spawn(Self::forward_engine_messages(
			bridge.subscribe(),
			tx.clone(),
		));

		let worker = HomePanelsWorker::new(rx, store, panel_info, events, &settings, metrics.clone());
		let worker_task = tokio::spawn(worker.run());

		info!("home panels service started");

		Self {
			handle: HomePanelsHandle { tx },
			metrics,
			worker_task,
			forwarder_task,
		}
	}

	pub fn handle(&self) -> HomePanelsHandle {
		self.handle.clone()
	}

	pub fn metrics(&self) -> Arc<HomePanelsMetrics> {
		self.metrics.clone()
	}

	/// Stop the service. Changes already accepted are drained before the
	/// worker exits.
	pub async fn shutdown(self) {
		self.forwarder_task.abort();
		let _ = self.handle.tx.send(Command::Shutdown);

		if let Err(err) = self.worker_task.await {
			if !err.is_cancelled() {
				error!(%err, "home panels worker panicked");
			}
		}

		self.metrics.log_metrics();
		info!("home panels service stopped");
	}

	async fn forward_engine_messages(
		mut rx: broadcast::Receiver<EngineMessage>,
		tx: mpsc::UnboundedSender<Command>,
	) {
		loop {
			match rx.recv().await {
				Ok(message) => {
					if !HANDLED_MESSAGES.contains(&message.name.as_str()) {
						continue;
					}
					if tx.send(Command::EngineMessage(message)).is_err() {
						break;
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					warn!(skipped, "engine message forwarder lagged");
				}
				Err(RecvError::Closed) => break,
			}
		}
	}
}
