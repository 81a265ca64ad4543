//! Workflow execution engine for dependency-ordered multi-agent teams.
//!
//! A team of agents and a workflow graph connecting them are validated up
//! front (`validate`), then executed by a `WorkflowRunner`: sequential steps
//! run one after another, parallel-group branches run concurrently against an
//! immutable context snapshot and merge back in declared order, and every
//! agent drives a bounded think/act/observe loop against the model gateway
//! and the capability registry. Every model call and capability invocation is
//! appended to a run-scoped `ExecutionLog`.
//!
//! A failure in one agent or branch never aborts siblings or the run; only
//! structural validation failures prevent execution from starting.

pub mod dispatch;
pub mod log;
pub mod reply;
pub mod runner;
pub mod validate;

pub use dispatch::{WorkflowRunner, MAX_PARALLEL_BRANCHES};
pub use log::ExecutionLog;
pub use reply::AgentReply;
pub use runner::AgentRunner;
pub use validate::{validate, ValidationError};
