//! Coalescing worker for home panel configuration changes
//!
//! Changes arrive as engine messages, accumulate in a pending queue, and
//! are applied to the store in one batch after a quiet period. The queue,
//! the invalidation timer, and all store access live on this single task;
//! nothing here needs a lock.

use super::{Command, HomePanelsMetrics};
use crate::config::HomePanelsSettings;
use crate::home::panel::PanelConfig;
use crate::home::panel_info::{PanelInfo, PanelInfoSource};
use crate::home::store::{Editor, HomeConfigStore};
use crate::infra::engine::{
	EngineMessage, MSG_HOME_PANELS_INSTALL, MSG_HOME_PANELS_REFRESH, MSG_HOME_PANELS_UNINSTALL,
	MSG_HOME_PANELS_UPDATE,
};
use crate::infra::event::{Event, EventBus};
use anyhow::anyhow;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

/// One pending configuration change, replayed in enqueue order
#[derive(Debug, Clone)]
pub(crate) enum ConfigChange {
	Uninstall(String),
	Install(PanelConfig),
	Update(PanelConfig),
	Refresh,
}

/// How soon the pending queue should be drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InvalidationMode {
	/// Wait out the quiet period so bursts collapse into one drain
	Delayed,
	/// Drain at the next scheduling opportunity
	Immediate,
}

pub(crate) struct HomePanelsWorker {
	receiver: mpsc::UnboundedReceiver<Command>,
	store: HomeConfigStore,
	panel_info: Arc<dyn PanelInfoSource>,
	events: Arc<EventBus>,
	invalidation_delay: Duration,
	panel_info_timeout: Duration,
	metrics: Arc<HomePanelsMetrics>,
	/// Pending changes in arrival order. Drained only by the timer path.
	pending: Vec<ConfigChange>,
	/// At most one outstanding invalidation; rearming overwrites it.
	deadline: Option<Instant>,
	/// Locale to persist with the next commit
	pending_locale: Option<String>,
}

impl HomePanelsWorker {
	pub(crate) fn new(
		receiver: mpsc::UnboundedReceiver<Command>,
		store: HomeConfigStore,
		panel_info: Arc<dyn PanelInfoSource>,
		events: Arc<EventBus>,
		settings: &HomePanelsSettings,
		metrics: Arc<HomePanelsMetrics>,
	) -> Self {
		Self {
			receiver,
			store,
			panel_info,
			events,
			invalidation_delay: Duration::from_millis(settings.invalidation_delay_ms),
			panel_info_timeout: Duration::from_millis(settings.panel_info_timeout_ms),
			metrics,
			pending: Vec::new(),
			deadline: None,
			pending_locale: None,
		}
	}

	pub(crate) async fn run(mut self) {
		info!("home panels worker started");

		loop {
			tokio::select! {
				command = self.receiver.recv() => match command {
					Some(Command::Shutdown) | None => break,
					Some(command) => self.handle_command(command),
				},
				_ = Self::invalidation_timer(self.deadline) => {
					self.deadline = None;
					self.drain_pending().await;
				}
			}
		}

		// Changes already accepted are applied before exit.
		if !self.pending.is_empty() {
			self.drain_pending().await;
		}

		info!("home panels worker stopped");
	}

	/// Resolves at `deadline`; never resolves while no invalidation is
	/// scheduled.
	async fn invalidation_timer(deadline: Option<Instant>) {
		match deadline {
			Some(deadline) => sleep_until(deadline).await,
			None => std::future::pending().await,
		}
	}

	fn handle_command(&mut self, command: Command) {
		match command {
			Command::EngineMessage(message) => self.handle_message(message),
			Command::LocaleReady(locale) => self.handle_locale_ready(locale),
			Command::QueryPanels(reply) => {
				let panels = match self.store.load() {
					Ok(state) => state.panels().to_vec(),
					Err(err) => {
						error!(%err, "query: cannot load home config");
						Vec::new()
					}
				};
				let _ = reply.send(panels);
			}
			// Handled by the run loop
			Command::Shutdown => {}
		}
	}

	fn handle_message(&mut self, message: EngineMessage) {
		match message.name.as_str() {
			MSG_HOME_PANELS_INSTALL => match parse_panel(&message.payload) {
				Ok(config) => self.enqueue(ConfigChange::Install(config), InvalidationMode::Delayed),
				Err(err) => {
					self.metrics.record_malformed_payload();
					warn!(%err, "cannot install panel, dropping event");
				}
			},
			MSG_HOME_PANELS_UNINSTALL => match parse_panel_id(&message.payload) {
				Ok(panel_id) => {
					self.enqueue(ConfigChange::Uninstall(panel_id), InvalidationMode::Delayed)
				}
				Err(err) => {
					self.metrics.record_malformed_payload();
					warn!(%err, "cannot uninstall panel, dropping event");
				}
			},
			MSG_HOME_PANELS_UPDATE => match parse_panel(&message.payload) {
				Ok(config) => self.enqueue(ConfigChange::Update(config), InvalidationMode::Delayed),
				Err(err) => {
					self.metrics.record_malformed_payload();
					warn!(%err, "cannot update panel, dropping event");
				}
			},
			MSG_HOME_PANELS_REFRESH => self.handle_dataset_refresh(&message.payload),
			other => debug!(name = other, "ignoring engine message"),
		}
	}

	/// Dataset refreshes bypass the pending queue entirely: the content
	/// change notification goes out as soon as the message is handled.
	fn handle_dataset_refresh(&mut self, payload: &Value) {
		let Some(dataset_id) = payload.get("datasetId").and_then(Value::as_str) else {
			self.metrics.record_malformed_payload();
			warn!("dataset refresh without datasetId, dropping event");
			return;
		};

		debug!(dataset_id, "dataset refresh requested");
		self.metrics.record_dataset_invalidated();
		self.events.emit(Event::DatasetInvalidated {
			dataset_id: dataset_id.to_string(),
		});
	}

	fn handle_locale_ready(&mut self, locale: String) {
		let stored = match self.store.load() {
			Ok(state) => state.locale().map(str::to_string),
			Err(err) => {
				error!(%err, "cannot read stored locale");
				None
			}
		};

		if stored.as_deref() == Some(locale.as_str()) {
			return;
		}

		debug!(%locale, "locale changed, scheduling immediate refresh");
		self.pending_locale = Some(locale);
		self.enqueue(ConfigChange::Refresh, InvalidationMode::Immediate);
	}

	/// Append to the pending queue and (re)arm the invalidation timer.
	/// Rearming always replaces the previous deadline, so a burst of
	/// delayed changes drains once after the burst settles and an
	/// immediate request wins over a pending delayed one.
	fn enqueue(&mut self, change: ConfigChange, mode: InvalidationMode) {
		self.pending.push(change);
		self.metrics.record_change_enqueued();

		let now = Instant::now();
		self.deadline = Some(match mode {
			InvalidationMode::Immediate => now,
			InvalidationMode::Delayed => now + self.invalidation_delay,
		});

		debug!(pending = self.pending.len(), ?mode, "scheduled invalidation");
	}

	/// One drain per timer fire: replay the queue against a single editor
	/// checkout, clear it, refresh if requested, commit once.
	async fn drain_pending(&mut self) {
		if self.pending.is_empty() && self.pending_locale.is_none() {
			return;
		}

		let mut editor = match self.store.edit() {
			Ok(editor) => editor,
			Err(err) => {
				// Queue kept; the next enqueue rearms the timer and retries.
				error!(%err, pending = self.pending.len(), "cannot load home config");
				return;
			}
		};

		let changes = std::mem::take(&mut self.pending);
		let count = changes.len();
		let mut needs_refresh = false;

		for change in changes {
			match change {
				ConfigChange::Uninstall(panel_id) => {
					if editor.uninstall(&panel_id) {
						debug!(%panel_id, "uninstalled panel");
					}
				}
				ConfigChange::Install(config) => {
					let panel_id = config.id.clone();
					if editor.install(config) {
						debug!(%panel_id, "installed panel");
					}
				}
				ConfigChange::Update(config) => {
					let panel_id = config.id.clone();
					if editor.update(config) {
						debug!(%panel_id, "updated panel");
					}
				}
				ConfigChange::Refresh => needs_refresh = true,
			}
		}

		// An untouched default config regenerates itself on the next load;
		// only user-customized state is worth refreshing.
		let should_refresh = needs_refresh && !editor.is_default();

		if let Some(locale) = self.pending_locale.take() {
			editor.set_locale(locale);
		}

		if should_refresh {
			self.execute_refresh(&mut editor).await;
		}

		match editor.apply() {
			Ok(_) => self.metrics.record_drain(count),
			// The queue is already cleared; these changes are not replayed.
			Err(err) => {
				self.metrics.record_drain(count);
				error!(%err, "failed to commit home config");
			}
		}
	}

	/// Refresh every stored panel in place: dynamic panels from the
	/// engine's info records, built-in panels from their local
	/// constructors.
	async fn execute_refresh(&self, editor: &mut Editor<'_>) {
		if editor.is_empty() {
			return;
		}

		let ids: HashSet<String> = editor.panels().map(|p| p.id.clone()).collect();
		debug!(panels = ids.len(), "refreshing panel configs");

		let infos = match timeout(self.panel_info_timeout, self.panel_info.request_by_ids(ids)).await
		{
			Ok(Ok(infos)) => infos,
			Ok(Err(err)) => {
				self.metrics.record_refresh_aborted();
				error!(%err, "panel info request failed, aborting refresh");
				return;
			}
			Err(_) => {
				// Soft-fail: whatever arrived by now is all we get.
				self.metrics.record_lookup_timeout();
				debug!("panel info request timed out, continuing without data");
				Vec::new()
			}
		};

		self.refresh_from_panel_infos(editor, &infos);
	}

	fn refresh_from_panel_infos(&self, editor: &mut Editor<'_>, infos: &[PanelInfo]) {
		let current: Vec<PanelConfig> = editor.panels().cloned().collect();

		for panel in current {
			let refreshed = if panel.is_dynamic() {
				match infos.iter().find(|info| info.id == panel.id) {
					Some(info) => match info.to_panel_config() {
						Ok(config) => Some(config),
						Err(err) => {
							warn!(panel_id = %panel.id, %err, "malformed panel info, keeping current config");
							None
						}
					},
					None => None,
				}
			} else {
				PanelConfig::builtin(panel.panel_type)
			};

			// Fail-soft: a panel nothing can regenerate stays as it is.
			let Some(refreshed) = refreshed else {
				debug!(panel_id = %panel.id, "no refreshed config, keeping current");
				continue;
			};

			if editor.update(refreshed) {
				self.metrics.record_panel_refreshed();
				debug!(panel_id = %panel.id, "refreshed panel config");
			}
		}
	}
}

fn parse_panel(payload: &Value) -> anyhow::Result<PanelConfig> {
	let panel = payload
		.get("panel")
		.ok_or_else(|| anyhow!("payload has no panel field"))?;

	let config: PanelConfig = serde_json::from_value(panel.clone())?;
	config.validate()?;
	Ok(config)
}

fn parse_panel_id(payload: &Value) -> anyhow::Result<String> {
	payload
		.get("id")
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| anyhow!("payload has no id field"))
}
