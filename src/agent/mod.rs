//! Agent module for instruction-driven code generation and execution
//!
//! This module provides the session state machine that orchestrates:
//! - Code generation through the completion collaborator
//! - Code block extraction from the session memory
//! - Code execution in the session's isolated environment
//!
//! # Architecture
//!
//! ```text
//! Instruction → SessionAgent.run()
//!                  ↓
//!           environment.start()
//!                  ↓
//!   ┌──► GenerateCode: extract(latest) → CodeGenerator → memory
//!   │              ↓
//!   │      ExecuteCode: extract(all) → CodeExecutor → environment.run() → memory
//!   │              ↓
//!   └── continuation policy: Continue / Stop
//!                  ↓
//!           environment.stop() (always)
//! ```

pub mod action;
pub mod config;
pub mod events;
pub mod session;

pub use action::{Action, Continuation, ContinuationPolicy, CycleReport, SessionState};
pub use config::SessionConfig;
pub use events::{EventSink, RecordingSink, SessionEvent, TracingSink};
pub use session::{AgentError, SessionAgent};
