//! Headless controller for a face-tagging photo browser.
//!
//! The renderer feeds pointer, scroll and keyboard input into
//! [`PhotoTagController`] and draws whatever [`ViewEvent`]s come back. All
//! backend work goes through a [`HostBridge`].

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod grid;
pub mod lightbox;
pub mod models;
pub mod overlay;
pub mod people;
pub mod scheduler;

pub use bridge::{HostBridge, MemoryBridge, SharedBridge};
pub use config::ControllerConfig;
pub use controller::{ActionOutcome, BulkReport, PhotoTagController, Prompt};
pub use error::{BridgeError, ControllerError};
pub use events::ViewEvent;
pub use people::{ListSettings, SortMode};
