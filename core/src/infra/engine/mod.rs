//! Bridge between the embedded engine and the core
//!
//! The engine delivers named messages with JSON payloads; the core sends
//! requests back the same way. Delivery is at-least-once and
//! order-preserving per sender, nothing more.

use crate::common::errors::{CoreError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

/// Engine messages about home panels
pub const MSG_HOME_PANELS_INSTALL: &str = "HomePanels:Install";
pub const MSG_HOME_PANELS_UNINSTALL: &str = "HomePanels:Uninstall";
pub const MSG_HOME_PANELS_UPDATE: &str = "HomePanels:Update";
pub const MSG_HOME_PANELS_REFRESH: &str = "HomePanels:RefreshDataset";

/// Request/response pair for panel info lookups
pub const MSG_HOME_PANELS_GET: &str = "HomePanels:Get";
pub const MSG_HOME_PANELS_DATA: &str = "HomePanels:Data";

/// A named message with a JSON payload
#[derive(Debug, Clone)]
pub struct EngineMessage {
	pub name: String,
	pub payload: Value,
}

impl EngineMessage {
	pub fn new(name: impl Into<String>, payload: Value) -> Self {
		Self {
			name: name.into(),
			payload,
		}
	}
}

/// In-process message bridge. The embedding layer dispatches inbound
/// engine messages and drains the outbound receiver returned by [`new`].
///
/// [`new`]: EngineBridge::new
#[derive(Debug)]
pub struct EngineBridge {
	inbound_tx: broadcast::Sender<EngineMessage>,
	outbound_tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineBridge {
	pub fn new(inbound_capacity: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<EngineMessage>) {
		let (inbound_tx, _) = broadcast::channel(inbound_capacity);
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		(
			Arc::new(Self {
				inbound_tx,
				outbound_tx,
			}),
			outbound_rx,
		)
	}

	/// Deliver a message from the engine to all core-side subscribers.
	pub fn dispatch(&self, message: EngineMessage) {
		trace!(name = %message.name, "dispatching engine message");
		let _ = self.inbound_tx.send(message);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<EngineMessage> {
		self.inbound_tx.subscribe()
	}

	/// Queue a message for delivery to the engine.
	pub fn send_to_engine(&self, message: EngineMessage) -> Result<()> {
		trace!(name = %message.name, "sending message to engine");
		self.outbound_tx
			.send(message)
			.map_err(|_| CoreError::BridgeClosed)
	}
}
