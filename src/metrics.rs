//! Prometheus metrics for session observability
//!
//! Collectors are registered in the default registry on first use.
//! Call [`gather`] to render them in the text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Session Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished sessions by outcome.
    ///
    /// Labels:
    /// - outcome: "done", "failed", "start_failed"
    pub static ref SESSIONS: CounterVec = register_counter_vec!(
        "codevisor_sessions_total",
        "Finished agent sessions by outcome",
        &["outcome"]
    ).expect("failed to register SESSIONS metric");

    /// Reaction cycles by action and result.
    ///
    /// Labels:
    /// - action: "GenerateCode" or "ExecuteCode"
    /// - status: "ok" or "error"
    pub static ref CYCLES: CounterVec = register_counter_vec!(
        "codevisor_cycles_total",
        "Reaction cycles run by action and status",
        &["action", "status"]
    ).expect("failed to register CYCLES metric");

    /// Environment stop failures swallowed during cleanup.
    pub static ref CLEANUP_FAILURES: CounterVec = register_counter_vec!(
        "codevisor_cleanup_failures_total",
        "Execution environment stop failures during session cleanup",
        &["environment"]
    ).expect("failed to register CLEANUP_FAILURES metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Execution Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Code executions by runtime and status ("success", "error", "timeout").
    pub static ref CODE_EXECUTIONS: CounterVec = register_counter_vec!(
        "codevisor_code_executions_total",
        "Code executions by language and status",
        &["language", "status"]
    ).expect("failed to register CODE_EXECUTIONS metric");

    /// Code execution wall time in seconds.
    pub static ref CODE_EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "codevisor_code_execution_seconds",
        "Code execution duration in seconds",
        &["language"],
        vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register CODE_EXECUTION_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // LLM Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completion call latency in seconds.
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "codevisor_llm_call_seconds",
        "Completion call duration in seconds",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register LLM_CALL_DURATION metric");
}

/// Render every registered metric in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_touched_metrics() {
        SESSIONS.with_label_values(&["done"]).inc();
        let text = gather();
        assert!(text.contains("codevisor_sessions_total"));
    }
}
