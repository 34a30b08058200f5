//! Run, plan, and execution-log data model.
//!
//! A [`Run`] tracks one user prompt from creation to a terminal state. Its
//! `execution_log` is append-only: the orchestrator pushes exactly one
//! terminal entry per plan step it attempted, in attempt order. The JSON
//! shape of these types is the runtime's wire format — they serialize
//! directly into API responses and store snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tool::JsonMap;

/// Lifecycle states of a [`Run`].
///
/// Transitions are monotonic within one execution pass:
/// pending → running → {completed | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Lifecycle states of a single step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A single intended tool invocation within a [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Ordering and resume key. The orchestrator executes steps in
    /// sequence order but uses `step_number` to decide what to skip on
    /// resume; duplicate or out-of-order numbers are a caller contract
    /// violation.
    pub step_number: u32,
    /// Name of a registered tool.
    pub tool: String,
    /// Tool parameters, shaped by the tool's input schema.
    pub input: JsonMap,
    /// Planner-provided rationale. Informational only.
    pub reasoning: String,
}

/// Ordered, immutable list of steps produced once by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Create a plan with a fresh identifier.
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            plan_id: Uuid::new_v4().to_string(),
            steps,
        }
    }
}

/// Record of one concrete attempt to execute a step.
///
/// The orchestrator creates a fresh entry per retry attempt but only the
/// attempt that terminates the retry loop is appended to the run's log;
/// `attempt` records how many tries that took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub step_number: u32,
    pub tool: String,
    /// Copy of the step's input at execution time.
    pub input: JsonMap,
    /// Tool output; present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub status: StepStatus,
    /// Failure cause; present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 1-based attempt counter.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionLogEntry {
    /// Begin an attempt: status running, clock started.
    pub fn started(step: &PlanStep, attempt: u32) -> Self {
        Self {
            step_number: step.step_number,
            tool: step.tool.clone(),
            input: step.input.clone(),
            output: None,
            status: StepStatus::Running,
            error: None,
            attempt,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Terminate this attempt successfully with the tool's output.
    pub fn finish_success(&mut self, output: Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    /// Terminate this attempt with a failure cause.
    pub fn finish_failure(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// One user-initiated task, tracked from pending through a terminal state.
///
/// The run is exclusively owned by the orchestration flow while it
/// executes; once returned, ownership transfers to the caller for
/// persistence via a [`crate::RunStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub prompt: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub execution_log: Vec<ExecutionLogEntry>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    /// Create a pending run with an empty log and a fresh identifier.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            status: RunStatus::Pending,
            plan: None,
            execution_log: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Whether the run reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_step() -> PlanStep {
        let mut input = JsonMap::new();
        input.insert("expression".into(), json!("1 + 1"));
        PlanStep {
            step_number: 1,
            tool: "Calculator".into(),
            input,
            reasoning: "add the numbers".into(),
        }
    }

    #[test]
    fn new_run_is_pending_with_empty_log() {
        let run = Run::new("do something");
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.execution_log.is_empty());
        assert!(run.plan.is_none());
        assert!(run.error.is_none());
        assert!(!run.is_terminal());
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(Run::new("a").run_id, Run::new("a").run_id);
    }

    #[test]
    fn log_entry_success_lifecycle() {
        let mut entry = ExecutionLogEntry::started(&sample_step(), 1);
        assert_eq!(entry.status, StepStatus::Running);
        assert!(entry.completed_at.is_none());

        entry.finish_success(json!(2.0));
        assert_eq!(entry.status, StepStatus::Completed);
        assert_eq!(entry.output, Some(json!(2.0)));
        assert!(entry.error.is_none());
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn log_entry_failure_lifecycle() {
        let mut entry = ExecutionLogEntry::started(&sample_step(), 3);
        entry.finish_failure("Division by zero");
        assert_eq!(entry.status, StepStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("Division by zero"));
        assert!(entry.output.is_none());
        assert_eq!(entry.attempt, 3);
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), "\"failed\"");
        assert_eq!(serde_json::to_string(&StepStatus::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn run_round_trips_through_json() {
        let mut run = Run::new("calculate things");
        run.plan = Some(Plan::new(vec![sample_step()]));
        run.status = RunStatus::Completed;
        let mut entry = ExecutionLogEntry::started(&sample_step(), 2);
        entry.finish_success(json!(2.0));
        run.execution_log.push(entry);
        run.completed_at = Some(Utc::now());

        let json = serde_json::to_string(&run).unwrap();
        let back: Run = serde_json::from_str(&json).unwrap();

        assert_eq!(back, run);
        assert_eq!(back.execution_log.len(), 1);
        assert_eq!(back.execution_log[0].attempt, 2);
    }
}
