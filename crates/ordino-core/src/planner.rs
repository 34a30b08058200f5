//! Planning abstraction.
//!
//! A planner turns a natural-language prompt into an executable [`Plan`]
//! exactly once per run; re-planning mid-execution is not part of the
//! model. The LLM-backed implementation lives in its own crate so the
//! core stays free of HTTP client machinery.

use async_trait::async_trait;

use crate::error::PlanError;
use crate::run::Plan;

/// Produces a plan for a prompt, or a reason why it cannot.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(&self, prompt: &str) -> Result<Plan, PlanError>;
}
