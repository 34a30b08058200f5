//! Core types and execution engine for the ordino agent runtime.
//!
//! This crate holds everything a runtime embedding needs:
//!
//! - The [`Run`]/[`Plan`] data model tracking one prompt from pending to a
//!   terminal state, including the append-only execution log.
//! - The [`Tool`] capability trait, its declarative [`InputSchema`], and
//!   the name-keyed [`ToolRegistry`].
//! - The [`Orchestrator`], which drives a plan step by step with bounded
//!   retry/backoff, fail-fast semantics, and idempotency-aware resumption.
//! - The [`RunStore`] persistence contract with an in-memory default.
//! - The [`Planner`] contract implemented by LLM backends elsewhere.
//!
//! The orchestrator is deliberately synchronous: one run executes on one
//! logical thread from start to terminal state. Callers that want
//! concurrency dispatch whole runs onto a worker pool.

pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod run;
pub mod schema;
pub mod store;
pub mod tool;

pub use error::{PlanError, ResumeError};
pub use orchestrator::{ExecutionConfig, Orchestrator};
pub use planner::Planner;
pub use registry::{ToolInfo, ToolRegistry};
pub use run::{ExecutionLogEntry, Plan, PlanStep, Run, RunStatus, StepStatus};
pub use schema::{FieldType, InputSchema, SchemaViolation};
pub use store::{InMemoryRunStore, RunStore};
pub use tool::{JsonMap, Tool, ToolResult};
