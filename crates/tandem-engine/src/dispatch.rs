//! Workflow dispatch: walks the validated node sequence, fanning parallel
//! branches out over a bounded pool and merging results back in declared
//! order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tandem_core::config::{AgentSpec, TeamConfig, Workflow, WorkflowNode};
use tandem_core::text::truncate_bytes;
use tandem_core::traits::ModelGateway;
use tandem_core::types::{ContextEntry, RunContext, RunResult, WorkflowOutcome};
use tandem_tools::CapabilityRegistry;

use crate::log::ExecutionLog;
use crate::runner::AgentRunner;
use crate::validate::{self, ValidationError};

/// Concurrency cap for one parallel group; the effective pool is the smaller
/// of this and the branch count, so pathological configs never fan out
/// unboundedly.
pub const MAX_PARALLEL_BRANCHES: usize = 4;

const STEP_CONTEXT_BYTES: usize = 1024;
const MERGE_CONTEXT_BYTES: usize = 2048;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 120;

/// Executes one validated workflow to completion or failure.
///
/// Construction validates the team definition; on structural defects the
/// runner is never built and no model or tool call is issued, so callers can
/// distinguish "never ran" from "ran with failures" without reading logs.
pub struct WorkflowRunner {
    agents: Arc<HashMap<String, AgentSpec>>,
    workflow: Workflow,
    gateway: Arc<dyn ModelGateway>,
    capabilities: Arc<CapabilityRegistry>,
    cancel: CancellationToken,
    gateway_timeout_secs: u64,
    max_parallel: usize,
}

impl WorkflowRunner {
    pub fn new(
        team: TeamConfig,
        gateway: Arc<dyn ModelGateway>,
        capabilities: Arc<CapabilityRegistry>,
    ) -> std::result::Result<Self, Vec<ValidationError>> {
        validate::validate(&team.agents, &team.workflow)?;
        let agents: HashMap<String, AgentSpec> = team
            .agents
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        Ok(Self {
            agents: Arc::new(agents),
            workflow: team.workflow,
            gateway,
            capabilities,
            cancel: CancellationToken::new(),
            gateway_timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            max_parallel: MAX_PARALLEL_BRANCHES,
        })
    }

    /// Set the per-call gateway timeout.
    pub fn with_gateway_timeout(mut self, secs: u64) -> Self {
        self.gateway_timeout_secs = secs;
        self
    }

    /// Set the parallel-branch pool cap.
    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Token for cancelling from outside the engine. Cancellation stops
    /// issuing new calls promptly; already-dispatched calls finish or time
    /// out, keeping the log intact.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Walk the workflow nodes in order, executing each to completion before
    /// the next. Always returns a complete outcome, even on partial failure.
    pub async fn run(&self) -> WorkflowOutcome {
        let log = ExecutionLog::new();
        let runner = AgentRunner::new(
            self.agents.clone(),
            self.gateway.clone(),
            self.capabilities.clone(),
            log.clone(),
            self.cancel.clone(),
            self.gateway_timeout_secs,
        );

        let mut context = RunContext::new();
        let mut results: HashMap<String, RunResult> = HashMap::new();

        for (index, node) in self.workflow.nodes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(node = index, "Cancellation requested, skipping remaining nodes");
                break;
            }

            match node {
                WorkflowNode::Step { agent } => {
                    let Some(spec) = self.agents.get(agent) else {
                        continue; // unreachable after validation
                    };
                    info!(node = index, agent_id = %spec.id, "Executing sequential step");
                    let result = runner.run_agent(spec, &context).await;
                    fold(&mut context, spec, &result, STEP_CONTEXT_BYTES);
                    results.insert(spec.id.clone(), result);
                }
                WorkflowNode::Parallel { branches, then } => {
                    info!(node = index, branches = branches.len(), "Dispatching parallel group");

                    // Branches read an immutable snapshot; none of them sees
                    // a sibling's in-flight work.
                    let snapshot = context.clone();
                    let limit = self.max_parallel.min(branches.len()).max(1);

                    // buffered() bounds the pool and yields results in
                    // declared branch order regardless of completion order.
                    let runner_ref = &runner;
                    let snapshot_ref = &snapshot;
                    let branch_results: Vec<RunResult> = futures::stream::iter(
                        branches
                            .iter()
                            .filter_map(|id| self.agents.get(id))
                            .map(|spec| async move { runner_ref.run_agent(spec, snapshot_ref).await }),
                    )
                    .buffered(limit)
                    .collect()
                    .await;

                    // Single-writer merge, in declared order. Failed branches
                    // merge their error stand-in rather than disappearing.
                    for result in branch_results {
                        if let Some(spec) = self.agents.get(&result.agent_id) {
                            fold(&mut context, spec, &result, MERGE_CONTEXT_BYTES);
                        }
                        results.insert(result.agent_id.clone(), result);
                    }

                    if let Some(then_id) = then {
                        if let Some(spec) = self.agents.get(then_id) {
                            info!(node = index, agent_id = %spec.id, "Executing follow-up agent");
                            let result = runner.run_agent(spec, &context).await;
                            fold(&mut context, spec, &result, STEP_CONTEXT_BYTES);
                            results.insert(spec.id.clone(), result);
                        }
                    }
                }
            }
        }

        WorkflowOutcome {
            results,
            log: log.into_records(),
        }
    }
}

fn fold(context: &mut RunContext, spec: &AgentSpec, result: &RunResult, max_bytes: usize) {
    let (output, truncated) = truncate_bytes(&result.output, max_bytes);
    if truncated {
        debug!(agent_id = %spec.id, max_bytes, "Truncated result while folding into context");
    }
    context.push(ContextEntry {
        agent_id: spec.id.clone(),
        role: spec.role.clone(),
        output,
    });
}
