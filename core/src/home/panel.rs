//! Panel configuration model
//!
//! Built-in panels are derived purely from their type; dynamic panels are
//! described by the engine and render one or more dataset-backed views.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminates the content source of a panel
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PanelType {
	TopSites,
	Bookmarks,
	CombinedHistory,
	RecentTabs,
	/// Configuration supplied by the engine rather than built in
	Dynamic,
}

/// How a view lays out its dataset items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewType {
	List,
	Grid,
}

/// One dataset-backed view inside a dynamic panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
	#[serde(rename = "type")]
	pub view_type: ViewType,

	/// Dataset rendered by this view
	pub dataset_id: String,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub item_type: Option<String>,
}

/// Configuration of a single home panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
	pub id: String,

	#[serde(rename = "type")]
	pub panel_type: PanelType,

	pub title: String,

	/// Panel shown first on the home screen
	#[serde(default)]
	pub default_panel: bool,

	#[serde(default)]
	pub disabled: bool,

	/// Views of a dynamic panel; empty for built-in types
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub views: Vec<ViewConfig>,
}

#[derive(Debug, Error)]
pub enum PanelValidationError {
	#[error("panel has an empty id")]
	MissingId,

	#[error("panel {0} has an empty title")]
	MissingTitle(String),

	#[error("dynamic panel {0} has no views")]
	NoViews(String),
}

impl PanelConfig {
	/// Whether this panel's configuration is supplied by the engine.
	pub fn is_dynamic(&self) -> bool {
		self.panel_type == PanelType::Dynamic
	}

	/// Built-in configuration for a panel type, independent of any
	/// external data. `None` for types the application cannot construct
	/// locally.
	pub fn builtin(panel_type: PanelType) -> Option<PanelConfig> {
		let (id, title) = match panel_type {
			PanelType::TopSites => ("top-sites-panel", "Top Sites"),
			PanelType::Bookmarks => ("bookmarks-panel", "Bookmarks"),
			PanelType::CombinedHistory => ("combined-history-panel", "History"),
			PanelType::RecentTabs => ("recent-tabs-panel", "Recent Tabs"),
			PanelType::Dynamic => return None,
		};

		Some(PanelConfig {
			id: id.to_string(),
			panel_type,
			title: title.to_string(),
			default_panel: panel_type == PanelType::TopSites,
			disabled: false,
			views: Vec::new(),
		})
	}

	/// Structural validation applied to engine-supplied configs.
	pub fn validate(&self) -> Result<(), PanelValidationError> {
		if self.id.is_empty() {
			return Err(PanelValidationError::MissingId);
		}
		if self.title.is_empty() {
			return Err(PanelValidationError::MissingTitle(self.id.clone()));
		}
		if self.is_dynamic() && self.views.is_empty() {
			return Err(PanelValidationError::NoViews(self.id.clone()));
		}
		Ok(())
	}
}

/// The panel set a fresh profile starts with.
pub fn default_panels() -> Vec<PanelConfig> {
	[
		PanelType::TopSites,
		PanelType::Bookmarks,
		PanelType::CombinedHistory,
	]
	.into_iter()
	.filter_map(PanelConfig::builtin)
	.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_panel_type_uses_kebab_case_tags() {
		let panel: PanelConfig = serde_json::from_value(json!({
			"id": "abc",
			"type": "top-sites",
			"title": "Top Sites"
		}))
		.unwrap();

		assert_eq!(panel.panel_type, PanelType::TopSites);
		assert!(!panel.is_dynamic());
		assert!(panel.views.is_empty());
	}

	#[test]
	fn test_dynamic_panel_roundtrip() {
		let panel: PanelConfig = serde_json::from_value(json!({
			"id": "weather",
			"type": "dynamic",
			"title": "Weather",
			"views": [
				{ "type": "grid", "dataset_id": "weather-data", "item_type": "image" }
			]
		}))
		.unwrap();

		assert!(panel.is_dynamic());
		panel.validate().unwrap();

		let value = serde_json::to_value(&panel).unwrap();
		assert_eq!(value["type"], "dynamic");
		assert_eq!(value["views"][0]["dataset_id"], "weather-data");
	}

	#[test]
	fn test_builtin_covers_every_local_type() {
		for panel_type in [
			PanelType::TopSites,
			PanelType::Bookmarks,
			PanelType::CombinedHistory,
			PanelType::RecentTabs,
		] {
			let panel = PanelConfig::builtin(panel_type).unwrap();
			assert_eq!(panel.panel_type, panel_type);
			panel.validate().unwrap();
		}

		assert!(PanelConfig::builtin(PanelType::Dynamic).is_none());
	}

	#[test]
	fn test_validate_rejects_dynamic_panel_without_views() {
		let panel = PanelConfig {
			id: "feed".to_string(),
			panel_type: PanelType::Dynamic,
			title: "Feed".to_string(),
			default_panel: false,
			disabled: false,
			views: Vec::new(),
		};

		assert!(matches!(
			panel.validate(),
			Err(PanelValidationError::NoViews(id)) if id == "feed"
		));
	}
}
