pub mod config;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use config::{AgentSpec, TeamConfig, Workflow, WorkflowNode};
pub use error::{Result, TandemError};
pub use traits::{Capability, GenerateRequest, ModelGateway};
pub use types::*;
