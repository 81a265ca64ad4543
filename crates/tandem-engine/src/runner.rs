//! Per-agent execution: sub-agent expansion plus the reasoning loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tandem_core::config::AgentSpec;
use tandem_core::error::{Result, TandemError};
use tandem_core::text::truncate_bytes;
use tandem_core::traits::{GenerateRequest, ModelGateway};
use tandem_core::types::{CallKind, ContextEntry, RunContext, RunResult, RunStatus};
use tandem_tools::CapabilityRegistry;

use crate::log::ExecutionLog;
use crate::reply::{self, AgentReply};

/// Sub-agent recursion bound, enforced independently of the host call stack.
pub const MAX_SUB_AGENT_DEPTH: usize = 20;
/// Byte bound for one sub-agent output folded into its parent's context.
const SUB_AGENT_CONTEXT_BYTES: usize = 1024;
const MAX_OUTPUT_TOKENS: u32 = 500;

/// Executes one agent at a time: runs its sub-agents first (sequentially, in
/// declaration order), folds their outputs into the working context, then
/// drives the agent's own think/act/observe loop. Shared by the dispatcher
/// across sequential steps and concurrent branches.
pub struct AgentRunner {
    agents: Arc<HashMap<String, AgentSpec>>,
    gateway: Arc<dyn ModelGateway>,
    capabilities: Arc<CapabilityRegistry>,
    log: ExecutionLog,
    cancel: CancellationToken,
    gateway_timeout_secs: u64,
}

impl AgentRunner {
    pub(crate) fn new(
        agents: Arc<HashMap<String, AgentSpec>>,
        gateway: Arc<dyn ModelGateway>,
        capabilities: Arc<CapabilityRegistry>,
        log: ExecutionLog,
        cancel: CancellationToken,
        gateway_timeout_secs: u64,
    ) -> Self {
        Self {
            agents,
            gateway,
            capabilities,
            log,
            cancel,
            gateway_timeout_secs,
        }
    }

    /// Produce one `RunResult` for the agent. Never raises past its boundary:
    /// any failure in a sub-agent or in the agent's own loop is captured as a
    /// `Failed` result so sibling and downstream work can proceed.
    pub fn run_agent<'a>(
        &'a self,
        agent: &'a AgentSpec,
        context: &'a RunContext,
    ) -> BoxFuture<'a, RunResult> {
        self.run_with_depth(agent, context, 0)
    }

    fn run_with_depth<'a>(
        &'a self,
        agent: &'a AgentSpec,
        context: &'a RunContext,
        depth: usize,
    ) -> BoxFuture<'a, RunResult> {
        Box::pin(async move {
            if depth > MAX_SUB_AGENT_DEPTH {
                error!(agent_id = %agent.id, depth, "Sub-agent depth limit exceeded");
                return RunResult::failed(
                    &agent.id,
                    TandemError::DepthExceeded(MAX_SUB_AGENT_DEPTH).to_string(),
                );
            }
            if self.cancel.is_cancelled() {
                return RunResult::failed(&agent.id, TandemError::Cancelled.to_string());
            }

            info!(agent_id = %agent.id, role = %agent.role, depth, "Running agent");

            // Sub-agents run first; their outputs become part of the parent's
            // context, a failed sub-agent contributes its error stand-in.
            let mut working = context.clone();
            for sub_id in &agent.sub_agents {
                let Some(sub) = self.agents.get(sub_id) else {
                    // Validation guarantees resolution; guard kept for
                    // directly constructed runners.
                    warn!(agent_id = %agent.id, sub_id = %sub_id, "Sub-agent not found, skipping");
                    continue;
                };
                let sub_result = self.run_with_depth(sub, &working, depth + 1).await;
                if sub_result.status.is_failed() {
                    warn!(
                        agent_id = %agent.id,
                        sub_id = %sub_id,
                        "Sub-agent failed, folding error into context"
                    );
                }
                let (output, _) = truncate_bytes(&sub_result.output, SUB_AGENT_CONTEXT_BYTES);
                working.push(ContextEntry {
                    agent_id: sub.id.clone(),
                    role: sub.role.clone(),
                    output,
                });
            }

            match self.reason(agent, &working).await {
                Ok((output, RunStatus::Degraded)) => RunResult::degraded(&agent.id, output),
                Ok((output, _)) => RunResult::success(&agent.id, output),
                Err(e) => {
                    error!(agent_id = %agent.id, error = %e, "Agent failed");
                    RunResult::failed(&agent.id, e.to_string())
                }
            }
        })
    }

    /// The think/act/observe loop.
    ///
    /// Issues at most `max_iterations` gateway calls; a reply without an
    /// action marker is the final answer, and exhausting the bound forces
    /// termination with the last reply and status `Degraded` so the run can
    /// never hang. Capability failures become observations, not errors.
    async fn reason(&self, agent: &AgentSpec, context: &RunContext) -> Result<(String, RunStatus)> {
        let system = self.build_system_message(agent);
        let mut prompt = build_prompt(agent, context);
        let mut last_reply = String::new();

        for turn in 0..agent.max_iterations {
            if self.cancel.is_cancelled() {
                return Err(TandemError::Cancelled);
            }
            debug!(agent_id = %agent.id, turn, "Starting reasoning turn");

            let text = self.generate_logged(agent, &system, &prompt).await?;

            match reply::parse(&text) {
                AgentReply::Final(answer) => {
                    info!(agent_id = %agent.id, turns = turn + 1, "Agent run complete");
                    return Ok((answer, RunStatus::Success));
                }
                AgentReply::Action { name, argument } => {
                    debug!(agent_id = %agent.id, capability = %name, "Action requested");
                    let observation = self.invoke_logged(agent, &name, argument).await;
                    prompt.push_str(&format!(
                        "\n\n[AGENT OUTPUT]: {text}\n[OBSERVATION]: {observation}\n(Continue your task with this result.)"
                    ));
                    last_reply = text;
                }
            }
        }

        warn!(
            agent_id = %agent.id,
            max_iterations = agent.max_iterations,
            "Iteration bound reached, terminating with last reply"
        );
        Ok((last_reply, RunStatus::Degraded))
    }

    /// One gateway call, bounded by the configured timeout and appended to
    /// the execution log whether it succeeds or fails.
    async fn generate_logged(&self, agent: &AgentSpec, system: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: agent.model.clone(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let start = Instant::now();
        let timeout = std::time::Duration::from_secs(self.gateway_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.gateway.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(TandemError::GatewayTimeout(self.gateway_timeout_secs)),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        self.log
            .append(&agent.id, CallKind::Model, &agent.model, prompt, &outcome, elapsed_ms);
        outcome
    }

    /// One capability invocation; failures (missing, disabled, timed out, or
    /// raised) come back as an error observation so the loop continues.
    async fn invoke_logged(&self, agent: &AgentSpec, name: &str, argument: String) -> String {
        let start = Instant::now();
        let outcome = if !agent.has_toolset(name) {
            Err(TandemError::CapabilityDisabled {
                agent: agent.id.clone(),
                name: name.to_string(),
            })
        } else {
            self.capabilities.invoke(name, argument.clone()).await
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        self.log
            .append(&agent.id, CallKind::Tool, name, &argument, &outcome, elapsed_ms);

        match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(agent_id = %agent.id, capability = name, error = %e, "Capability call failed");
                format!("ERROR: {e}")
            }
        }
    }

    fn build_system_message(&self, agent: &AgentSpec) -> String {
        let mut system = format!("You are a {}. {}", agent.role, agent.goal);
        let usage = self.capabilities.usage_instructions(&agent.toolsets);
        if !usage.is_empty() {
            system.push_str("\n\n");
            system.push_str(&usage);
        }
        system
    }
}

/// Build the user prompt: the agent's fixed instruction (or the default
/// header) plus the rendered run context.
fn build_prompt(agent: &AgentSpec, context: &RunContext) -> String {
    let header = match &agent.instruction {
        Some(instruction) => instruction.clone(),
        None => format!(
            "AGENT ID : {}\nROLE     : {}\nGOAL     : {}",
            agent.id, agent.role, agent.goal
        ),
    };
    if context.is_empty() {
        header
    } else {
        format!("{header}\n\nCONTEXT:\n{}", context.render())
    }
}
