//! StateStore - cached pin snapshot shared by polls and commands
//!
//! Holds the last snapshot reported by the device service, the single
//! in-flight refresh flag and the last problem message.

use super::types::{PinField, PinState, Snapshot};
use crate::pins::{report_lines, ReportField, ReportLine, Revision};
use parking_lot::RwLock;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

struct Inner {
    snapshot: Snapshot,
    /// Empty when there is nothing to report
    problem: String,
}

/// Cached pin states with refresh backpressure
pub struct StateStore {
    inner: RwLock<Inner>,
    /// Mirrors the refresh state; only written while `inner` is write-locked
    refreshing: AtomicBool,
    revision: Revision,
    report: Vec<ReportLine>,
}

impl StateStore {
    /// Create an empty store reporting pins for `revision`
    pub fn new(revision: Revision) -> Self {
        Self {
            inner: RwLock::new(Inner {
                snapshot: Snapshot::default(),
                problem: String::new(),
            }),
            refreshing: AtomicBool::new(false),
            revision,
            report: report_lines(revision),
        }
    }

    /// Board revision the reporters were built for
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Lock-free check used by the poll fast path
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Claim the refresh slot, returns false if a refresh is already running
    pub fn try_begin_refresh(&self) -> bool {
        if self.is_refreshing() {
            return false;
        }
        let _guard = self.inner.write();
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Finish a refresh started with [`try_begin_refresh`](Self::try_begin_refresh)
    ///
    /// Success swaps in the new snapshot and clears the problem. Failure keeps
    /// the old snapshot and records the error message.
    pub fn complete_refresh<E: Display>(&self, result: Result<Snapshot, E>) {
        let mut inner = self.inner.write();
        match result {
            Ok(snapshot) => {
                debug!("Snapshot refreshed ({} pins)", snapshot.len());
                inner.snapshot = snapshot;
                inner.problem.clear();
            }
            Err(e) => {
                inner.problem = e.to_string();
                debug!("Refresh failed, keeping previous snapshot: {}", inner.problem);
            }
        }
        self.refreshing.store(false, Ordering::Release);
    }

    /// Overwrite one field of a known pin; unknown pins are ignored
    pub fn patch_field(&self, bcm: &str, field: PinField, new_value: impl Into<String>) -> bool {
        let patched = self.inner.write().snapshot.patch(bcm, field, new_value.into());
        if !patched {
            trace!("Ignoring patch for unknown pin {}", bcm);
        }
        patched
    }

    /// Whether the current snapshot knows this BCM id
    pub fn contains(&self, bcm: &str) -> bool {
        self.inner.read().snapshot.contains(bcm)
    }

    /// Current snapshot (cheap clone)
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().snapshot.clone()
    }

    /// Last problem message, empty if none
    pub fn problem(&self) -> String {
        self.inner.read().problem.clone()
    }

    /// Record a problem without touching the snapshot
    pub fn record_problem(&self, message: impl Into<String>) {
        self.inner.write().problem = message.into();
    }

    /// Acknowledge the last problem. Pin data is left as is.
    pub fn reset(&self) {
        self.inner.write().problem.clear();
    }

    /// Render the poll response body
    ///
    /// One `name value` line per reporter whose pin is present, followed by a
    /// `_problem` line when a problem is pending.
    pub fn render(&self) -> String {
        let inner = self.inner.read();
        let mut body = String::new();

        for line in &self.report {
            if let Some(pin) = inner.snapshot.get(line.bcm) {
                body.push_str(&line.name);
                body.push(' ');
                body.push_str(render_field(line.field, pin));
                body.push('\n');
            }
        }

        if !inner.problem.is_empty() {
            body.push_str("_problem ");
            body.push_str(&inner.problem);
            body.push('\n');
        }

        body
    }
}

/// GPIO reporters are booleans: only "0" is false
fn render_field(field: ReportField, pin: &PinState) -> &str {
    match field {
        ReportField::BoolValue => {
            if pin.value == "0" {
                "false"
            } else {
                "true"
            }
        }
        ReportField::RawValue => &pin.value,
        ReportField::Function => &pin.function,
    }
}
