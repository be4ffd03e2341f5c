//! Single-flight gate for triggered runs
//!
//! At most one run per key (parser name, or the weekly report) may be in
//! flight. A second trigger for a busy key is refused instead of queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Key used for the weekly report run
pub const WEEKLY_REPORT_KEY: &str = "weekly-report";

#[derive(Debug, Clone, Default)]
pub struct RunGate {
    running: Arc<Mutex<HashSet<String>>>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`; `None` if a run for it is already in flight
    pub fn try_acquire(&self, key: &str) -> Option<RunGuard> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(key.to_string()) {
            return None;
        }
        Some(RunGuard {
            running: Arc::clone(&self.running),
            key: key.to_string(),
        })
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl RunGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
