//! Session agent configuration

use std::time::Duration;

use super::action::{Action, ContinuationPolicy};
use crate::generator::ParsePolicy;

/// Fixed configuration record supplied at session construction
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Profile used as the agent's role on the messages it produces
    pub profile: String,
    /// Interpreter that runs python programs (e.g. "python3")
    pub kernel_name: String,
    /// Bound on every remote execution
    pub execution_timeout: Duration,
    /// Maximum reaction cycles before the session gives up
    pub max_cycles: usize,
    /// Rule evaluated after each cycle
    pub continuation: ContinuationPolicy,
    /// Generator behaviour when the reply has no matching block
    pub parse_policy: ParsePolicy,
    /// Runtime names the environment image provides; `None` keeps them all
    pub runtimes: Option<Vec<String>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: "codevisor".to_string(),
            kernel_name: "python3".to_string(),
            execution_timeout: Duration::from_secs(60),
            max_cycles: Action::ORDER.len(),
            continuation: ContinuationPolicy::ByOrder,
            parse_policy: ParsePolicy::Lenient,
            runtimes: None,
        }
    }
}
