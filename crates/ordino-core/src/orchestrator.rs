//! Plan execution with retry, fail-fast, and resumption.
//!
//! The orchestrator consumes a [`Run`] and a [`Plan`] and drives the plan
//! step by step against the tool registry. Each step gets a bounded
//! exponential-backoff retry loop; the first step that exhausts its
//! retries fails the whole run immediately. A failed run whose completed
//! steps are all safe to replay can later be resumed from where it left
//! off.
//!
//! Faults never escape this module: tool panics, missing tools, and
//! timeouts all collapse into a terminal run state with a descriptive
//! error string.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::error::ResumeError;
use crate::registry::ToolRegistry;
use crate::run::{ExecutionLogEntry, Plan, PlanStep, Run, RunStatus, StepStatus};
use crate::tool::ToolResult;

/// Tuning knobs for step execution, passed by value at construction.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Additional attempts after the first; 2 means up to 3 tries total.
    pub max_retries: u32,
    /// Delay before the second attempt.
    pub initial_retry_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Hard per-attempt deadline for a tool invocation.
    pub step_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_retry_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            step_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecutionConfig {
    /// The backoff schedule: delay slept before attempt `k` (k >= 2) is
    /// `initial_retry_delay * backoff_multiplier^(k - 2)`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 2, "no delay precedes the first attempt");
        self.initial_retry_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32 - 2))
    }
}

/// Executes plans against a shared tool registry.
///
/// The orchestrator itself is stateless apart from its configuration;
/// one instance serves any number of concurrent runs, each executing on
/// its own thread of control.
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    config: ExecutionConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutionConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute a complete run with the given plan.
    ///
    /// Attaches the plan, marks the run running, and executes steps in
    /// the sequence order provided. The run is returned in a terminal
    /// state: completed if every step succeeded, failed at the first step
    /// that exhausted its retries (remaining steps never execute). This
    /// method never panics past its boundary; an unexpected fault becomes
    /// a failed run.
    pub fn execute_run(&self, mut run: Run, plan: Plan) -> Run {
        tracing::info!(run_id = %run.run_id, steps = plan.steps.len(), "executing run");
        let steps = plan.steps.clone();
        run.plan = Some(plan);
        run.status = RunStatus::Running;

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.drive(&mut run, &steps, None, false)));

        if let Err(payload) = outcome {
            run.status = RunStatus::Failed;
            run.error = Some(format!("Execution error: {}", panic_message(&payload)));
            run.completed_at = Some(Utc::now());
        }

        run
    }

    /// Whether a failed run can be safely resumed.
    ///
    /// True only when the run has failed and every completed log entry is
    /// safe to have already happened per its tool's `replay_safe` answer.
    /// A completed entry whose tool is no longer registered is
    /// conservatively treated as unsafe.
    pub fn can_retry_run(&self, run: &Run) -> bool {
        if run.status != RunStatus::Failed {
            return false;
        }

        run.execution_log
            .iter()
            .filter(|entry| entry.status == StepStatus::Completed)
            .all(|entry| {
                self.registry
                    .get(&entry.tool)
                    .map(|tool| tool.replay_safe(&entry.input))
                    .unwrap_or(false)
            })
    }

    /// Resume a failed run from where it left off.
    ///
    /// Skips every step whose number is at or below the highest completed
    /// step and executes the rest exactly like [`Self::execute_run`],
    /// appending only new entries. A resume that reaches the end clears
    /// the run's prior error. Fails without mutating the run if the
    /// resume policy forbids it or the run carries no plan.
    pub fn resume_run(&self, mut run: Run) -> Result<Run, ResumeError> {
        if !self.can_retry_run(&run) {
            return Err(ResumeError::NotResumable);
        }
        let plan = run.plan.clone().ok_or(ResumeError::MissingPlan)?;

        let last_completed = run
            .execution_log
            .iter()
            .filter(|entry| entry.status == StepStatus::Completed)
            .map(|entry| entry.step_number)
            .max();

        tracing::info!(
            run_id = %run.run_id,
            last_completed_step = last_completed.unwrap_or(0),
            "resuming run"
        );
        run.status = RunStatus::Running;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.drive(&mut run, &plan.steps, last_completed, true)
        }));

        if let Err(payload) = outcome {
            run.status = RunStatus::Failed;
            run.error = Some(format!(
                "Resume execution error: {}",
                panic_message(&payload)
            ));
            run.completed_at = Some(Utc::now());
        }

        Ok(run)
    }

    /// Sequential step loop shared by fresh execution and resumption.
    fn drive(&self, run: &mut Run, steps: &[PlanStep], skip_through: Option<u32>, resume: bool) {
        for step in steps {
            if let Some(last) = skip_through {
                if step.step_number <= last {
                    continue;
                }
            }

            let entry = self.execute_step_with_retry(step);
            let failed = entry.status == StepStatus::Failed;
            let cause = entry.error.clone().unwrap_or_default();
            run.execution_log.push(entry);

            if failed {
                run.status = RunStatus::Failed;
                run.error = Some(if resume {
                    format!("Step {} failed on resume: {cause}", step.step_number)
                } else {
                    format!("Step {} failed: {cause}", step.step_number)
                });
                run.completed_at = Some(Utc::now());
                tracing::warn!(run_id = %run.run_id, step = step.step_number, %cause, "run failed");
                return;
            }
        }

        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now());
        if resume {
            // A successful resume erases the prior failure reason.
            run.error = None;
        }
        tracing::info!(run_id = %run.run_id, "run completed");
    }

    /// Retry loop for a single step.
    ///
    /// A fresh log entry is created per attempt; only the attempt that
    /// terminates the loop — first success, or failure once retries are
    /// exhausted — is returned. Intermediate failed attempts are dropped.
    fn execute_step_with_retry(&self, step: &PlanStep) -> ExecutionLogEntry {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut entry = ExecutionLogEntry::started(step, attempt);

            match self.invoke_tool(step) {
                Ok(ToolResult::Success { output }) => {
                    entry.finish_success(output);
                    return entry;
                }
                Ok(ToolResult::Failure { error }) => entry.finish_failure(error),
                Err(fault) => entry.finish_failure(format!("Execution exception: {fault}")),
            }

            if attempt > self.config.max_retries {
                return entry;
            }

            let delay = self.config.retry_delay(attempt + 1);
            tracing::warn!(
                step = step.step_number,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "step failed, retrying"
            );
            thread::sleep(delay);
        }
    }

    /// One tool invocation under the configured step deadline.
    ///
    /// The tool runs on a helper thread so the deadline can be enforced
    /// on a synchronous call; a panicking tool drops the channel sender
    /// and surfaces here as a fault rather than unwinding the run.
    /// Retries are blind to the fault's cause: a missing tool, a timeout,
    /// and a panic all feed the same retry path as an ordinary failure.
    fn invoke_tool(&self, step: &PlanStep) -> Result<ToolResult, String> {
        let tool = self
            .registry
            .get(&step.tool)
            .ok_or_else(|| format!("Tool '{}' not found in registry", step.tool))?;

        let (sender, receiver) = mpsc::channel();
        let input = step.input.clone();
        thread::spawn(move || {
            let result = tool.execute(&input);
            // The receiver is gone if the deadline already expired.
            let _ = sender.send(result);
        });

        match receiver.recv_timeout(self.config.step_timeout) {
            Ok(result) => Ok(result),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(format!(
                "Tool '{}' timed out after {:.1}s",
                step.tool,
                self.config.step_timeout.as_secs_f64()
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(format!("Tool '{}' aborted unexpectedly", step.tool))
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, InputSchema};
    use crate::tool::{JsonMap, Tool, ToolResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures_before_success` times, then succeeds.
    struct FlakyTool {
        name: &'static str,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl FlakyTool {
        fn new(name: &'static str, failures_before_success: u32) -> Self {
            Self {
                name,
                failures_before_success,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fails a configured number of times"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::new()
        }
        fn execute(&self, _input: &JsonMap) -> ToolResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                ToolResult::failure("transient failure")
            } else {
                ToolResult::success(json!("ok"))
            }
        }
    }

    /// Succeeds, but refuses replay for `operation == "append"`.
    struct AppendTool;

    impl Tool for AppendTool {
        fn name(&self) -> &str {
            "Appender"
        }
        fn description(&self) -> &str {
            "non-idempotent append"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::new().required_field("operation", FieldType::String, "op")
        }
        fn execute(&self, _input: &JsonMap) -> ToolResult {
            ToolResult::success(json!("appended"))
        }
        fn replay_safe(&self, input: &JsonMap) -> bool {
            input.get("operation").and_then(|v| v.as_str()) != Some("append")
        }
    }

    struct PanickingTool;

    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "Panics"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::new()
        }
        fn execute(&self, _input: &JsonMap) -> ToolResult {
            panic!("boom");
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "Slow"
        }
        fn description(&self) -> &str {
            "sleeps past the deadline"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::new()
        }
        fn execute(&self, _input: &JsonMap) -> ToolResult {
            thread::sleep(Duration::from_millis(250));
            ToolResult::success(json!("too late"))
        }
    }

    fn fast_config(max_retries: u32) -> ExecutionConfig {
        ExecutionConfig {
            max_retries,
            initial_retry_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            step_timeout: Duration::from_secs(5),
        }
    }

    fn step(number: u32, tool: &str) -> PlanStep {
        PlanStep {
            step_number: number,
            tool: tool.to_string(),
            input: JsonMap::new(),
            reasoning: String::new(),
        }
    }

    fn step_with(number: u32, tool: &str, key: &str, value: serde_json::Value) -> PlanStep {
        let mut input = JsonMap::new();
        input.insert(key.to_string(), value);
        PlanStep {
            step_number: number,
            tool: tool.to_string(),
            input,
            reasoning: String::new(),
        }
    }

    fn orchestrator(tools: Vec<Arc<dyn Tool>>, config: ExecutionConfig) -> Orchestrator {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Orchestrator::new(Arc::new(registry), config)
    }

    #[test]
    fn fail_fast_stops_at_first_failure() {
        let orchestrator = orchestrator(
            vec![
                Arc::new(FlakyTool::new("AlwaysFails", u32::MAX)),
                Arc::new(FlakyTool::new("WouldSucceed", 0)),
            ],
            fast_config(0),
        );

        let plan = Plan::new(vec![step(1, "AlwaysFails"), step(2, "WouldSucceed")]);
        let run = orchestrator.execute_run(Run::new("test"), plan);

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.execution_log.len(), 1);
        assert_eq!(run.execution_log[0].step_number, 1);
        assert!(run.error.as_deref().unwrap().starts_with("Step 1 failed:"));
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn retry_exhaustion_records_final_attempt() {
        let orchestrator = orchestrator(
            vec![Arc::new(FlakyTool::new("AlwaysFails", u32::MAX))],
            fast_config(2),
        );

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "AlwaysFails")]));

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.execution_log.len(), 1);
        // max_retries = 2 additional attempts, so the terminal entry is
        // attempt 3.
        assert_eq!(run.execution_log[0].attempt, 3);
        assert_eq!(run.execution_log[0].status, StepStatus::Failed);
    }

    #[test]
    fn first_attempt_success_ignores_retry_budget() {
        let orchestrator = orchestrator(
            vec![Arc::new(FlakyTool::new("Immediate", 0))],
            fast_config(5),
        );

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Immediate")]));

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.execution_log[0].attempt, 1);
    }

    #[test]
    fn flaky_tool_succeeds_within_budget() {
        let orchestrator = orchestrator(
            vec![Arc::new(FlakyTool::new("Flaky", 2))],
            fast_config(2),
        );

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Flaky")]));

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.execution_log.len(), 1);
        assert_eq!(run.execution_log[0].attempt, 3);
        assert_eq!(run.execution_log[0].status, StepStatus::Completed);
    }

    #[test]
    fn backoff_schedule_is_exponential() {
        let config = ExecutionConfig {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            step_timeout: Duration::from_secs(30),
        };

        assert_eq!(config.retry_delay(2), Duration::from_secs(1));
        assert_eq!(config.retry_delay(3), Duration::from_secs(2));
        assert_eq!(config.retry_delay(4), Duration::from_secs(4));
        assert_eq!(config.retry_delay(5), Duration::from_secs(8));
    }

    #[test]
    fn missing_tool_is_retried_like_any_fault() {
        let orchestrator = orchestrator(vec![], fast_config(1));

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Ghost")]));

        assert_eq!(run.status, RunStatus::Failed);
        let entry = &run.execution_log[0];
        assert_eq!(entry.attempt, 2);
        assert!(
            entry
                .error
                .as_deref()
                .unwrap()
                .contains("Tool 'Ghost' not found in registry")
        );
        assert!(entry.error.as_deref().unwrap().starts_with("Execution exception:"));
    }

    #[test]
    fn panicking_tool_becomes_step_failure() {
        let orchestrator = orchestrator(vec![Arc::new(PanickingTool)], fast_config(0));

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Panics")]));

        assert_eq!(run.status, RunStatus::Failed);
        assert!(
            run.execution_log[0]
                .error
                .as_deref()
                .unwrap()
                .contains("aborted unexpectedly")
        );
    }

    #[test]
    fn slow_tool_hits_step_deadline() {
        let config = ExecutionConfig {
            max_retries: 0,
            initial_retry_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            step_timeout: Duration::from_millis(20),
        };
        let orchestrator = orchestrator(vec![Arc::new(SlowTool)], config);

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Slow")]));

        assert_eq!(run.status, RunStatus::Failed);
        assert!(
            run.execution_log[0]
                .error
                .as_deref()
                .unwrap()
                .contains("timed out")
        );
    }

    #[test]
    fn can_retry_requires_failed_status() {
        let orchestrator = orchestrator(vec![Arc::new(FlakyTool::new("Ok", 0))], fast_config(0));

        let pending = Run::new("test");
        assert!(!orchestrator.can_retry_run(&pending));

        let completed = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "Ok")]));
        assert_eq!(completed.status, RunStatus::Completed);
        assert!(!orchestrator.can_retry_run(&completed));
    }

    #[test]
    fn can_retry_rejects_completed_non_idempotent_mutation() {
        let orchestrator = orchestrator(
            vec![
                Arc::new(AppendTool),
                Arc::new(FlakyTool::new("AlwaysFails", u32::MAX)),
            ],
            fast_config(0),
        );

        let plan = Plan::new(vec![
            step_with(1, "Appender", "operation", json!("append")),
            step(2, "AlwaysFails"),
        ]);
        let run = orchestrator.execute_run(Run::new("test"), plan);

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.execution_log[0].status, StepStatus::Completed);
        assert!(!orchestrator.can_retry_run(&run));
        assert_eq!(
            orchestrator.resume_run(run).unwrap_err(),
            ResumeError::NotResumable
        );
    }

    #[test]
    fn can_retry_allows_replay_safe_completed_steps() {
        let orchestrator = orchestrator(
            vec![
                Arc::new(AppendTool),
                Arc::new(FlakyTool::new("AlwaysFails", u32::MAX)),
            ],
            fast_config(0),
        );

        let plan = Plan::new(vec![
            step_with(1, "Appender", "operation", json!("read")),
            step(2, "AlwaysFails"),
        ]);
        let run = orchestrator.execute_run(Run::new("test"), plan);

        assert_eq!(run.status, RunStatus::Failed);
        assert!(orchestrator.can_retry_run(&run));
    }

    #[test]
    fn resume_skips_completed_steps_and_clears_error() {
        // Step 2 fails once on the first pass, then succeeds on resume.
        let flaky = Arc::new(FlakyTool::new("Flaky", 1));
        let counter = Arc::new(FlakyTool::new("Counter", 0));
        let orchestrator = orchestrator(
            vec![counter.clone(), flaky.clone()],
            fast_config(0),
        );

        let plan = Plan::new(vec![step(1, "Counter"), step(2, "Flaky")]);
        let run = orchestrator.execute_run(Run::new("test"), plan);

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.execution_log.len(), 2);
        assert!(run.error.is_some());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        let resumed = orchestrator.resume_run(run).unwrap();

        assert_eq!(resumed.status, RunStatus::Completed);
        assert!(resumed.error.is_none(), "successful resume clears error");
        // Step 1 was not re-executed.
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        // Original two entries untouched, one new entry appended.
        assert_eq!(resumed.execution_log.len(), 3);
        assert_eq!(resumed.execution_log[0].step_number, 1);
        assert_eq!(resumed.execution_log[1].step_number, 2);
        assert_eq!(resumed.execution_log[1].status, StepStatus::Failed);
        assert_eq!(resumed.execution_log[2].step_number, 2);
        assert_eq!(resumed.execution_log[2].status, StepStatus::Completed);
    }

    #[test]
    fn resume_failure_uses_resume_error_message() {
        let orchestrator = orchestrator(
            vec![Arc::new(FlakyTool::new("AlwaysFails", u32::MAX))],
            fast_config(0),
        );

        let run = orchestrator.execute_run(Run::new("test"), Plan::new(vec![step(1, "AlwaysFails")]));
        assert_eq!(run.status, RunStatus::Failed);

        let resumed = orchestrator.resume_run(run).unwrap();
        assert_eq!(resumed.status, RunStatus::Failed);
        assert!(
            resumed
                .error
                .as_deref()
                .unwrap()
                .starts_with("Step 1 failed on resume:")
        );
    }

    #[test]
    fn all_steps_succeeding_completes_run_in_order() {
        let orchestrator = orchestrator(
            vec![
                Arc::new(FlakyTool::new("First", 0)),
                Arc::new(FlakyTool::new("Second", 0)),
                Arc::new(FlakyTool::new("Third", 0)),
            ],
            fast_config(0),
        );

        let plan = Plan::new(vec![step(1, "First"), step(2, "Second"), step(3, "Third")]);
        let run = orchestrator.execute_run(Run::new("test"), plan);

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error.is_none());
        let attempted: Vec<u32> = run.execution_log.iter().map(|e| e.step_number).collect();
        assert_eq!(attempted, vec![1, 2, 3]);
        assert!(run.plan.is_some());
    }
}
