//! Event bus for decoupled communication

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast capacity for core events. Lagging receivers skip old events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A central event type that represents all events the core announces to
/// its frontends
#[derive(Debug, Clone, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all_fields = "snake_case")]
pub enum Event {
	// Core lifecycle events
	CoreStarted,
	CoreShutdown,

	/// A dataset backing one or more dynamic panels changed; views
	/// rendering it should requery their content
	DatasetInvalidated { dataset_id: String },

	/// The committed home panel configuration changed
	HomePanelsChanged { panels: usize },
}

/// Fan-out bus for [`Event`]s
#[derive(Debug)]
pub struct EventBus {
	tx: broadcast::Sender<Event>,
}

impl EventBus {
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.tx.subscribe()
	}

	/// Emit an event to all current subscribers. An event emitted while
	/// nobody is subscribed is dropped.
	pub fn emit(&self, event: Event) {
		trace!(event = event.as_ref(), "emitting core event");
		let _ = self.tx.send(event);
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}
