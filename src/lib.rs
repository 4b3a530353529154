//! GPIO GW - Scratch 2 extension bridging to a WebIOPi device
//!
//! Scratch polls this gateway over HTTP; the gateway keeps a cached snapshot
//! of the Raspberry Pi GPIO state and forwards command blocks to the WebIOPi
//! REST service.

pub mod api;
pub mod bridge;
pub mod config;
pub mod pins;
pub mod remote;
pub mod state;

pub use bridge::{Bridge, Command};
pub use config::AppConfig;
pub use pins::{PinScheme, Revision};
pub use remote::{RemoteClient, RemoteError};
pub use state::StateStore;
