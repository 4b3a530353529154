//! Bridge - glue between Scratch requests and the device service
//!
//! One `Bridge` owns the state store and the REST client and is shared with
//! the HTTP layer. Polls never wait on the device: they kick off at most one
//! background refresh and answer from the cached snapshot.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::pins::{to_canonical, PinScheme};
use crate::remote::{RemoteClient, RemoteError};
use crate::state::StateStore;

/// A Scratch command block, decoded from `/{action}/{id}/{argument}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive a pin high (`true`) or low
    SetValue {
        scheme: PinScheme,
        id: String,
        high: bool,
    },
    /// Change a pin function ("in", "out", "pwm")
    SetFunction {
        scheme: PinScheme,
        id: String,
        function: String,
    },
}

impl Command {
    /// Decode a command path; unknown actions give `None`
    ///
    /// `setGPIO` takes `true`/`false`, `setPin` takes `ON`/`OFF`. Anything that
    /// is not the "on" token means low.
    pub fn parse(action: &str, id: &str, argument: &str) -> Option<Self> {
        let id = id.to_string();
        match action {
            "setGPIO" => Some(Command::SetValue {
                scheme: PinScheme::Gpio,
                id,
                high: argument == "true",
            }),
            "setPin" => Some(Command::SetValue {
                scheme: PinScheme::Header,
                id,
                high: argument == "ON",
            }),
            "setGPIOFn" => Some(Command::SetFunction {
                scheme: PinScheme::Gpio,
                id,
                function: argument.to_string(),
            }),
            "setPinFn" => Some(Command::SetFunction {
                scheme: PinScheme::Header,
                id,
                function: argument.to_string(),
            }),
            _ => None,
        }
    }

    fn target(&self) -> (PinScheme, &str) {
        match self {
            Command::SetValue { scheme, id, .. } | Command::SetFunction { scheme, id, .. } => {
                (*scheme, id.as_str())
            }
        }
    }
}

/// Shared context for request handlers
pub struct Bridge {
    store: Arc<StateStore>,
    remote: RemoteClient,
}

impl Bridge {
    /// Build a bridge for the configured device with an empty store
    pub fn new(device: &DeviceConfig) -> Result<Self, RemoteError> {
        let store = Arc::new(StateStore::new(device.revision));
        let remote = RemoteClient::new(device, Arc::clone(&store))?;
        Ok(Self::with_remote(remote))
    }

    /// Build a bridge around an existing client
    ///
    /// The client's store is shared, and its revision drives both command
    /// mapping and the poll reporters.
    pub fn with_remote(remote: RemoteClient) -> Self {
        Self {
            store: Arc::clone(remote.store()),
            remote,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Blocking first refresh so the first poll already has data
    ///
    /// Failures are recorded as the current problem, never returned.
    pub async fn init(&self) {
        if !self.store.try_begin_refresh() {
            return;
        }
        let result = self.remote.fetch_all().await;
        match &result {
            Ok(snapshot) => info!("Initial GPIO state loaded ({} pins)", snapshot.len()),
            Err(e) => warn!("Initial GPIO state unavailable: {}", e),
        }
        self.store.complete_refresh(result);
    }

    /// Answer a Scratch poll
    ///
    /// Starts a background refresh unless one is already running, then renders
    /// whatever is cached right now.
    pub fn poll(&self) -> String {
        if self.store.try_begin_refresh() {
            self.spawn_refresh();
        }
        self.store.render()
    }

    fn spawn_refresh(&self) {
        let remote = self.remote.clone();
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let result = remote.fetch_all().await;
            if let Err(e) = &result {
                warn!("GPIO refresh failed: {}", e);
            }
            store.complete_refresh(result);
        });
    }

    /// Handle `/reset_all`
    pub fn reset(&self) {
        debug!("Reset all requested");
        self.store.reset();
    }

    /// Run a command block against the device
    ///
    /// Unknown pins are dropped silently; device failures become the current
    /// problem.
    pub async fn execute(&self, command: Command) {
        let (scheme, id) = command.target();
        let Some(bcm) = to_canonical(scheme, id, self.store.revision()) else {
            debug!("Ignoring command for unknown {:?} pin {:?}", scheme, id);
            return;
        };

        let result = match &command {
            Command::SetValue { high, .. } => {
                let value = if *high { "1" } else { "0" };
                self.remote.set_value(bcm, value).await
            }
            Command::SetFunction { function, .. } => {
                self.remote.set_function(bcm, function).await
            }
        };

        match result {
            Ok(Some(applied)) => debug!("GPIO {} now {}", bcm, applied),
            Ok(None) => debug!("GPIO {} not reported by device, command dropped", bcm),
            Err(e) => {
                warn!("Command for GPIO {} failed: {}", bcm, e);
                self.store.record_problem(e.to_string());
            }
        }
    }
}
