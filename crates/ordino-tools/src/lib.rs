//! Bundled tools for the ordino runtime.
//!
//! Two reference tools ship with the runtime: [`Calculator`], a pure
//! arithmetic evaluator, and [`TodoStore`], a mutable in-memory task
//! list. Between them they exercise both halves of the resume-safety
//! contract: the calculator is always safe to replay, the todo store's
//! `add` operation is not.

pub mod calculator;
pub mod todo;

pub use calculator::Calculator;
pub use todo::{TodoItem, TodoStore};
