//! State management module - cached GPIO state from the device service
//!
//! The store keeps the last full snapshot reported by WebIOPi and renders it
//! for Scratch polls. Refreshes swap the whole snapshot; single-pin command
//! replies patch one field in place.

mod store;
mod types;

pub use store::StateStore;
pub use types::{PinField, PinMap, PinState, Snapshot};
