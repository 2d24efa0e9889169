//! Long-running core services

pub mod home_panels;

pub use home_panels::{HomePanelsHandle, HomePanelsService};
