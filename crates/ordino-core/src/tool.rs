//! The tool capability abstraction.

use serde_json::Value;

use crate::schema::InputSchema;

/// JSON object passed to and copied around tool invocations.
pub type JsonMap = serde_json::Map<String, Value>;

/// The outcome of a single tool invocation.
///
/// Success carries structured output, failure carries a human-readable
/// cause; the two are mutually exclusive by construction. Results are not
/// persisted directly — the orchestrator folds them into log entries.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success { output: Value },
    Failure { error: String },
}

impl ToolResult {
    /// Create a successful result from any JSON-convertible output.
    pub fn success(output: impl Into<Value>) -> Self {
        ToolResult::Success {
            output: output.into(),
        }
    }

    /// Create a failed result with a cause.
    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// The success output, if any.
    pub fn output(&self) -> Option<&Value> {
        match self {
            ToolResult::Success { output } => Some(output),
            ToolResult::Failure { .. } => None,
        }
    }

    /// The failure cause, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { error } => Some(error),
        }
    }
}

/// A named, schema-described unit of synchronous work.
///
/// Tools are registered once at startup and shared across concurrently
/// executing runs, so implementations must be safe to invoke from
/// multiple runs at once. A tool's state scope is a deliberate choice:
/// stateless, or an explicit process-global singleton shared by every run
/// (document which on the implementing type).
pub trait Tool: Send + Sync {
    /// Stable identifier; plan steps reference tools by this name.
    fn name(&self) -> &str;

    /// Human-readable description, also fed to the planner's prompt.
    fn description(&self) -> &str;

    /// Declarative schema for `execute` input.
    fn input_schema(&self) -> InputSchema;

    /// Perform the work. Expected failures are reported through the
    /// result, not panics.
    fn execute(&self, input: &JsonMap) -> ToolResult;

    /// Whether a completed invocation with this input is safe to have
    /// already happened when the rest of its plan is re-executed.
    ///
    /// The orchestrator consults this when deciding if a failed run may
    /// be resumed: resuming skips completed steps, so any completed
    /// non-idempotent mutation (one that would duplicate if the caller
    /// instead re-ran the whole plan) must answer `false`. Pure and
    /// idempotent operations keep the default.
    fn replay_safe(&self, _input: &JsonMap) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_carries_output_only() {
        let result = ToolResult::success(json!({"count": 2}));
        assert!(result.is_success());
        assert_eq!(result.output(), Some(&json!({"count": 2})));
        assert_eq!(result.error_message(), None);
    }

    #[test]
    fn failure_carries_error_only() {
        let result = ToolResult::failure("Division by zero");
        assert!(!result.is_success());
        assert_eq!(result.output(), None);
        assert_eq!(result.error_message(), Some("Division by zero"));
    }
}
