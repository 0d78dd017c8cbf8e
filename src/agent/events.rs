//! Session observability sink
//!
//! A session reports its progress through an `EventSink` handed to it at
//! construction. `TracingSink` turns events into structured `tracing` records;
//! `RecordingSink` keeps them in memory for embedding hosts and tests.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::action::{Action, Continuation, SessionState};

/// Something that happened during a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    EnvironmentStarting { environment: String },
    EnvironmentStartFailed { error: String },
    StateChanged { state: SessionState },
    CycleStarted { cycle: usize, action: Action },
    CycleFinished {
        cycle: usize,
        action: Action,
        reason: String,
        continuation: Continuation,
    },
    CycleFailed { cycle: usize, action: Action, error: String },
    EnvironmentStopped,
    EnvironmentStopFailed { error: String },
    Finished { state: SessionState },
}

/// Receives session events
pub trait EventSink: Send + Sync {
    fn emit(&self, session_id: &str, event: &SessionEvent);
}

/// Emits events as structured log records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, session_id: &str, event: &SessionEvent) {
        match event {
            SessionEvent::EnvironmentStarting { environment } => {
                info!(session_id, environment = %environment, "Starting execution environment")
            }
            SessionEvent::EnvironmentStartFailed { error } => {
                warn!(session_id, error = %error, "Execution environment failed to start")
            }
            SessionEvent::StateChanged { state } => debug!(session_id, state = %state, "State changed"),
            SessionEvent::CycleStarted { cycle, action } => {
                info!(session_id, cycle, action = %action, "Cycle started")
            }
            SessionEvent::CycleFinished {
                cycle,
                action,
                reason,
                continuation,
            } => info!(
                session_id,
                cycle,
                action = %action,
                reason = %reason,
                continuation = ?continuation,
                "Cycle finished"
            ),
            SessionEvent::CycleFailed { cycle, action, error } => {
                warn!(session_id, cycle, action = %action, error = %error, "Cycle failed")
            }
            SessionEvent::EnvironmentStopped => info!(session_id, "Execution environment stopped"),
            SessionEvent::EnvironmentStopFailed { error } => {
                warn!(session_id, error = %error, "Execution environment failed to stop")
            }
            SessionEvent::Finished { state } => info!(session_id, state = %state, "Session finished"),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, _session_id: &str, event: &SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
