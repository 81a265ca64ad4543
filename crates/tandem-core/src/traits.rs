use futures::future::BoxFuture;

use crate::error::Result;

/// One generation request handed to a model backend.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model backend name, as declared on the agent.
    pub model: String,
    /// System message (role, goal, capability instructions).
    pub system: String,
    /// The full prompt, including the rendered run context.
    pub prompt: String,
    /// Output token bound.
    pub max_tokens: u32,
}

/// The single abstract "generate reply" operation a model backend provides.
///
/// Must be safe to call repeatedly; the engine assumes no session or
/// connection state. Failures surface as the gateway error variants of
/// `TandemError` and fail only the calling agent, never the process.
pub trait ModelGateway: Send + Sync + 'static {
    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, Result<String>>;
}

/// A named external operation an agent may invoke mid-reasoning.
pub trait Capability: Send + Sync + 'static {
    /// Capability name (matched against agent toolsets and action markers).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Instruction block injected into the system prompt of agents that have
    /// this capability enabled, telling the model how to request it.
    fn usage(&self) -> String;

    /// Invoke the capability with a free-text argument.
    fn invoke(&self, argument: String) -> BoxFuture<'_, Result<String>>;

    /// Timeout in seconds for one invocation.
    fn timeout_secs(&self) -> u64 {
        30
    }
}
