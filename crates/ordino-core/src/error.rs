//! Error types shared across the runtime's contracts.

use thiserror::Error;

/// Failures surfaced by a [`crate::Planner`] when turning a prompt into a
/// plan.
///
/// Planning errors are synchronous, caller-facing validation errors: they
/// are never retried by the runtime beyond the planner's own single
/// fallback attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The prompt was empty or whitespace-only.
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    /// The model responded, but the response could not be turned into a
    /// well-formed plan (bad JSON, missing fields, unknown tool names,
    /// schema-mismatched step input).
    #[error("Failed to generate valid plan: {reason}")]
    InvalidPlan { reason: String },

    /// The model backend could not be reached or returned a transport
    /// level failure.
    #[error("LLM generation failed: {reason}")]
    LlmUnavailable { reason: String },
}

impl PlanError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        PlanError::InvalidPlan {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        PlanError::LlmUnavailable {
            reason: reason.into(),
        }
    }
}

/// Policy violations reported by [`crate::Orchestrator::resume_run`].
///
/// Resumption refuses to touch the run at all when these fire; the stored
/// snapshot stays unchanged.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ResumeError {
    /// The run is not in a resumable state: either it has not failed, or
    /// one of its completed steps is not safe to have already happened
    /// (a non-idempotent mutation that would duplicate on re-execution).
    #[error("Run cannot be resumed")]
    NotResumable,

    /// The run has no plan attached, so there is nothing to resume.
    #[error("Run has no plan to resume")]
    MissingPlan,
}
