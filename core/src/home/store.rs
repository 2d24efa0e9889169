//! Home panel configuration store
//!
//! The store hands out immutable state snapshots and editor checkouts.
//! An editor accumulates mutations in memory and commits them back in a
//! single `apply`, so a batch of changes is atomic from the store's point
//! of view even though the individual edits are not.

use crate::common::errors::Result;
use crate::home::panel::{default_panels, PanelConfig};
use crate::infra::event::{Event, EventBus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const SAVED_CONFIG_VERSION: u32 = 1;

/// Persisted form of the home configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedHomeConfig {
	pub version: u32,

	/// Locale the configuration was last committed under
	#[serde(default)]
	pub locale: Option<String>,

	pub panels: Vec<PanelConfig>,

	pub saved_at: DateTime<Utc>,
}

/// Storage seam for the home configuration
pub trait ConfigBackend: Send + Sync {
	/// `None` when nothing has ever been committed.
	fn load(&self) -> Result<Option<SavedHomeConfig>>;

	fn save(&self, config: &SavedHomeConfig) -> Result<()>;
}

/// Whole-file JSON persistence under the profile's data directory
pub struct JsonFileBackend {
	path: PathBuf,
}

impl JsonFileBackend {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}
}

impl ConfigBackend for JsonFileBackend {
	fn load(&self) -> Result<Option<SavedHomeConfig>> {
		if !self.path.exists() {
			return Ok(None);
		}

		let json = fs::read_to_string(&self.path)?;
		let config: SavedHomeConfig = serde_json::from_str(&json)?;

		if config.version > SAVED_CONFIG_VERSION {
			warn!(
				"Home config v{} is newer than supported v{}, proceeding anyway",
				config.version, SAVED_CONFIG_VERSION
			);
		}

		Ok(Some(config))
	}

	fn save(&self, config: &SavedHomeConfig) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
		debug!(path = %self.path.display(), "saved home config");
		Ok(())
	}
}

/// In-memory backend. Records every committed snapshot, which also makes
/// it the backend of choice for tests that count commits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	saved: Mutex<Vec<SavedHomeConfig>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn commit_count(&self) -> usize {
		self.saved.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub fn last(&self) -> Option<SavedHomeConfig> {
		self.saved
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.last()
			.cloned()
	}

	/// Pre-populate the backend, as if `config` had been committed before.
	pub fn seed(&self, config: SavedHomeConfig) {
		self.saved
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(config);
	}
}

impl ConfigBackend for MemoryBackend {
	fn load(&self) -> Result<Option<SavedHomeConfig>> {
		Ok(self
			.saved
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.last()
			.cloned())
	}

	fn save(&self, config: &SavedHomeConfig) -> Result<()> {
		self.saved
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(config.clone());
		Ok(())
	}
}

/// Immutable snapshot of the current configuration
#[derive(Debug, Clone)]
pub struct HomeConfigState {
	panels: Vec<PanelConfig>,
	locale: Option<String>,
	is_default: bool,
}

impl HomeConfigState {
	pub fn panels(&self) -> &[PanelConfig] {
		&self.panels
	}

	pub fn locale(&self) -> Option<&str> {
		self.locale.as_deref()
	}

	/// Whether this is the generated default set rather than saved user
	/// customization.
	pub fn is_default(&self) -> bool {
		self.is_default
	}

	pub fn is_empty(&self) -> bool {
		self.panels.is_empty()
	}
}

/// Store front-end over a [`ConfigBackend`]
pub struct HomeConfigStore {
	backend: Arc<dyn ConfigBackend>,
	events: Arc<EventBus>,
}

impl HomeConfigStore {
	pub fn new(backend: Arc<dyn ConfigBackend>, events: Arc<EventBus>) -> Self {
		Self { backend, events }
	}

	/// Current state: the last committed snapshot, or the built-in default
	/// set when nothing was ever committed.
	pub fn load(&self) -> Result<HomeConfigState> {
		Ok(match self.backend.load()? {
			Some(saved) => HomeConfigState {
				panels: saved.panels,
				locale: saved.locale,
				is_default: false,
			},
			None => HomeConfigState {
				panels: default_panels(),
				locale: None,
				is_default: true,
			},
		})
	}

	/// Check out an editor over the current state.
	pub fn edit(&self) -> Result<Editor<'_>> {
		Ok(Editor {
			store: self,
			state: self.load()?,
			changed: false,
		})
	}
}

/// Mutable checkout of the configuration
pub struct Editor<'a> {
	store: &'a HomeConfigStore,
	state: HomeConfigState,
	changed: bool,
}

impl Editor<'_> {
	/// Insert a panel, replacing any existing panel with the same id.
	/// Returns whether the stored set changed.
	pub fn install(&mut self, config: PanelConfig) -> bool {
		if let Some(existing) = self.state.panels.iter_mut().find(|p| p.id == config.id) {
			if *existing == config {
				return false;
			}
			*existing = config;
		} else {
			self.state.panels.push(config);
		}

		self.changed = true;
		true
	}

	/// Remove a panel by id. No-op returning false when absent.
	pub fn uninstall(&mut self, panel_id: &str) -> bool {
		let before = self.state.panels.len();
		self.state.panels.retain(|p| p.id != panel_id);

		if self.state.panels.len() == before {
			return false;
		}

		self.changed = true;
		true
	}

	/// Replace the config of an existing panel. No-op returning false
	/// when absent.
	pub fn update(&mut self, config: PanelConfig) -> bool {
		match self.state.panels.iter_mut().find(|p| p.id == config.id) {
			Some(existing) => {
				*existing = config;
				self.changed = true;
				true
			}
			None => false,
		}
	}

	pub fn set_locale(&mut self, locale: impl Into<String>) {
		let locale = Some(locale.into());
		if self.state.locale != locale {
			self.state.locale = locale;
			self.changed = true;
		}
	}

	/// Panels in stored order.
	pub fn panels(&self) -> impl Iterator<Item = &PanelConfig> {
		self.state.panels.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.state.panels.is_empty()
	}

	/// Whether this editor still represents the untouched default
	/// configuration.
	pub fn is_default(&self) -> bool {
		self.state.is_default && !self.changed
	}

	/// Commit all accumulated edits in one save. A checkout that was
	/// never mutated commits nothing.
	pub fn apply(self) -> Result<HomeConfigState> {
		if !self.changed {
			debug!("apply: nothing changed, skipping commit");
			return Ok(self.state);
		}

		let saved = SavedHomeConfig {
			version: SAVED_CONFIG_VERSION,
			locale: self.state.locale.clone(),
			panels: self.state.panels.clone(),
			saved_at: Utc::now(),
		};

		self.store.backend.save(&saved)?;
		self.store.events.emit(Event::HomePanelsChanged {
			panels: saved.panels.len(),
		});
		info!(panels = saved.panels.len(), "committed home config");

		Ok(HomeConfigState {
			panels: self.state.panels,
			locale: self.state.locale,
			is_default: false,
		})
	}
}
