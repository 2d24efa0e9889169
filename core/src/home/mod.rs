//! Home screen panel configuration

pub mod panel;
pub mod panel_info;
pub mod store;
