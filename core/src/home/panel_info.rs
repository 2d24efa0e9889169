//! Panel info lookups against the engine
//!
//! A refresh pass asks the engine for fresh descriptions of the panels it
//! currently stores. The engine answers eventually or never; callers bound
//! the wait themselves.

use crate::home::panel::PanelConfig;
use crate::infra::engine::{
	EngineBridge, EngineMessage, MSG_HOME_PANELS_DATA, MSG_HOME_PANELS_GET,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PanelInfoError {
	#[error("Engine bridge closed")]
	BridgeClosed,
}

/// One panel description returned by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelInfo {
	pub id: String,

	/// Raw panel payload as delivered; parsed on use
	pub panel: Value,
}

impl PanelInfo {
	pub fn to_panel_config(&self) -> serde_json::Result<PanelConfig> {
		serde_json::from_value(self.panel.clone())
	}
}

/// Source of fresh panel descriptions, queried by id set
#[async_trait]
pub trait PanelInfoSource: Send + Sync + 'static {
	/// Request descriptions for exactly `ids`. Resolves when the source
	/// answers, which may be never.
	async fn request_by_ids(
		&self,
		ids: HashSet<String>,
	) -> Result<Vec<PanelInfo>, PanelInfoError>;
}

/// Engine-backed lookup: sends `HomePanels:Get` and resolves on the
/// `HomePanels:Data` response carrying the same request id.
pub struct EnginePanelInfoClient {
	bridge: Arc<EngineBridge>,
}

impl EnginePanelInfoClient {
	pub fn new(bridge: Arc<EngineBridge>) -> Self {
		Self { bridge }
	}
}

#[async_trait]
impl PanelInfoSource for EnginePanelInfoClient {
	async fn request_by_ids(
		&self,
		ids: HashSet<String>,
	) -> Result<Vec<PanelInfo>, PanelInfoError> {
		let request_id = Uuid::new_v4().to_string();

		// Subscribe before sending so the response cannot slip past.
		let mut rx = self.bridge.subscribe();

		self.bridge
			.send_to_engine(EngineMessage::new(
				MSG_HOME_PANELS_GET,
				json!({
					"requestId": request_id,
					"ids": ids.iter().collect::<Vec<_>>(),
				}),
			))
			.map_err(|_| PanelInfoError::BridgeClosed)?;

		loop {
			let message = match rx.recv().await {
				Ok(message) => message,
				Err(RecvError::Lagged(skipped)) => {
					warn!(skipped, "panel info subscriber lagged");
					continue;
				}
				Err(RecvError::Closed) => return Err(PanelInfoError::BridgeClosed),
			};

			if message.name != MSG_HOME_PANELS_DATA {
				continue;
			}

			match message.payload.get("requestId").and_then(Value::as_str) {
				Some(id) if id == request_id => {}
				_ => continue,
			}

			let panels: Vec<PanelInfo> = message
				.payload
				.get("panels")
				.and_then(Value::as_array)
				.map(|entries| {
					entries
						.iter()
						.filter_map(|entry| {
							match serde_json::from_value::<PanelInfo>(entry.clone()) {
								Ok(info) => Some(info),
								Err(err) => {
									warn!(%err, "dropping malformed panel info entry");
									None
								}
							}
						})
						.collect()
				})
				.unwrap_or_default();

			debug!(count = panels.len(), "panel info response received");
			return Ok(panels);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::sync::mpsc;

	/// Minimal engine double: answers every `HomePanels:Get` with the
	/// given panels, echoing the request id.
	fn spawn_engine_stub(
		bridge: Arc<EngineBridge>,
		mut outbound: mpsc::UnboundedReceiver<EngineMessage>,
		panels: Vec<Value>,
	) {
		tokio::spawn(async move {
			while let Some(message) = outbound.recv().await {
				if message.name != MSG_HOME_PANELS_GET {
					continue;
				}

				let request_id = message.payload["requestId"].clone();
				bridge.dispatch(EngineMessage::new(
					MSG_HOME_PANELS_DATA,
					json!({ "requestId": request_id, "panels": panels }),
				));
			}
		});
	}

	#[tokio::test]
	async fn test_request_resolves_on_matching_response() {
		let (bridge, outbound) = EngineBridge::new(16);
		spawn_engine_stub(
			bridge.clone(),
			outbound,
			vec![json!({
				"id": "feed",
				"panel": { "id": "feed", "type": "dynamic", "title": "Feed" }
			})],
		);

		let client = EnginePanelInfoClient::new(bridge);
		let infos = client
			.request_by_ids(HashSet::from(["feed".to_string()]))
			.await
			.unwrap();

		assert_eq!(infos.len(), 1);
		assert_eq!(infos[0].id, "feed");
		assert_eq!(infos[0].to_panel_config().unwrap().title, "Feed");
	}

	#[tokio::test]
	async fn test_response_for_other_request_is_ignored() {
		let (bridge, mut outbound) = EngineBridge::new(16);

		{
			let bridge = bridge.clone();
			tokio::spawn(async move {
				let message = outbound.recv().await.unwrap();
				let request_id = message.payload["requestId"].clone();

				// A stale response first, then the real one.
				bridge.dispatch(EngineMessage::new(
					MSG_HOME_PANELS_DATA,
					json!({
						"requestId": "someone-elses-request",
						"panels": [ { "id": "wrong", "panel": {} } ],
					}),
				));
				bridge.dispatch(EngineMessage::new(
					MSG_HOME_PANELS_DATA,
					json!({ "requestId": request_id, "panels": [] }),
				));
			});
		}

		let client = EnginePanelInfoClient::new(bridge);
		let infos = client
			.request_by_ids(HashSet::from(["feed".to_string()]))
			.await
			.unwrap();

		assert!(infos.is_empty());
	}

	#[tokio::test]
	async fn test_closed_bridge_is_an_error() {
		let (bridge, outbound) = EngineBridge::new(16);
		drop(outbound);

		let client = EnginePanelInfoClient::new(bridge);
		let result = client.request_by_ids(HashSet::new()).await;

		assert!(matches!(result, Err(PanelInfoError::BridgeClosed)));
	}
}
