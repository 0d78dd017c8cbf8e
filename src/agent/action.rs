//! Actions, session states and the continuation policy

use std::fmt;

use crate::environment::ExecutionStatus;

/// The two operations a session cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GenerateCode,
    ExecuteCode,
}

impl Action {
    /// Declaration order; the cursor walks it round-robin
    pub const ORDER: [Action; 2] = [Action::GenerateCode, Action::ExecuteCode];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GenerateCode => "GenerateCode",
            Action::ExecuteCode => "ExecuteCode",
        }
    }

    /// Whether this is the final action of the order
    pub fn is_last(&self) -> bool {
        Action::ORDER.last() == Some(self)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round-robin pointer over [`Action::ORDER`]
#[derive(Debug, Clone, Default)]
pub struct ActionCursor {
    position: usize,
}

impl ActionCursor {
    pub fn current(&self) -> Action {
        Action::ORDER[self.position % Action::ORDER.len()]
    }

    pub fn advance(&mut self) {
        self.position += 1;
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, waiting for its inbound message
    Pending,
    /// Running GenerateCode
    Generating,
    /// Running ExecuteCode
    Executing,
    /// Returned a final message
    Done,
    /// Ended with an error
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Pending => "pending",
            SessionState::Generating => "generating",
            SessionState::Executing => "executing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened in one reaction cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: usize,
    pub action: Action,
    /// Human-readable summary of the cycle
    pub reason: String,
    /// Set for ExecuteCode cycles
    pub execution: Option<ExecutionStatus>,
}

/// Decision taken after each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Advance the cursor to the next action
    Continue,
    /// Run the same action again without advancing the cursor
    Retry,
    /// Return this cycle's message as the result
    Stop,
}

/// Rule deciding whether a session runs another cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuationPolicy {
    /// Stop once the last action of the order has run
    #[default]
    ByOrder,
    /// Re-run a failed or timed-out execution until one succeeds or the
    /// cycle budget runs out
    ///
    /// The retried run sees the same history, so this recovers from
    /// transient environment failures, not from broken code.
    RetryOnError,
}

impl ContinuationPolicy {
    pub fn decide(&self, report: &CycleReport) -> Continuation {
        match self {
            ContinuationPolicy::ByOrder => {
                if report.action.is_last() {
                    Continuation::Stop
                } else {
                    Continuation::Continue
                }
            }
            ContinuationPolicy::RetryOnError => match report.execution {
                Some(status) if status.is_success() => Continuation::Stop,
                Some(_) => Continuation::Retry,
                None => Continuation::Continue,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(action: Action, execution: Option<ExecutionStatus>) -> CycleReport {
        CycleReport {
            cycle: 1,
            action,
            reason: String::new(),
            execution,
        }
    }

    #[test]
    fn test_cursor_round_robin() {
        let mut cursor = ActionCursor::default();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(cursor.current());
            cursor.advance();
        }
        assert_eq!(
            seen,
            vec![
                Action::GenerateCode,
                Action::ExecuteCode,
                Action::GenerateCode,
                Action::ExecuteCode,
                Action::GenerateCode,
            ]
        );
    }

    #[test]
    fn test_by_order_stops_after_last_action() {
        let policy = ContinuationPolicy::ByOrder;
        assert_eq!(policy.decide(&report(Action::GenerateCode, None)), Continuation::Continue);
        assert_eq!(
            policy.decide(&report(Action::ExecuteCode, Some(ExecutionStatus::Error))),
            Continuation::Stop
        );
    }

    #[test]
    fn test_retry_on_error_repeats_failed_execution() {
        let policy = ContinuationPolicy::RetryOnError;
        assert_eq!(policy.decide(&report(Action::GenerateCode, None)), Continuation::Continue);
        assert_eq!(
            policy.decide(&report(Action::ExecuteCode, Some(ExecutionStatus::Timeout))),
            Continuation::Retry
        );
        assert_eq!(
            policy.decide(&report(Action::ExecuteCode, Some(ExecutionStatus::Error))),
            Continuation::Retry
        );
        assert_eq!(
            policy.decide(&report(Action::ExecuteCode, Some(ExecutionStatus::Success))),
            Continuation::Stop
        );
    }
}
