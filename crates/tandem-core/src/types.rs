use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of one agent's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The agent produced a final answer.
    Success,
    /// The iteration bound was hit; the last reply stands in as the answer.
    Degraded,
    /// No usable output could be produced.
    Failed,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Per-agent final output plus status.
///
/// Failed results keep an `[ERROR: ...]` stand-in as their output so that
/// downstream context never silently loses a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub agent_id: String,
    pub status: RunStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn success(agent_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: RunStatus::Success,
            output: output.into(),
            error: None,
        }
    }

    pub fn degraded(agent_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: RunStatus::Degraded,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            agent_id: agent_id.into(),
            status: RunStatus::Failed,
            output: format!("[ERROR: {error}]"),
            error: Some(error),
        }
    }
}

/// Kind of a logged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// A model-gateway generation.
    Model,
    /// A capability invocation.
    Tool,
}

/// One entry in the execution log.
///
/// Immutable once appended. `seq` is assigned at append time and is strictly
/// increasing across the whole run, including across concurrent branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub seq: u64,
    pub agent_id: String,
    pub kind: CallKind,
    /// Model or capability name.
    pub target: String,
    /// Truncated input handed to the call.
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// One prior result visible to a downstream agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub agent_id: String,
    pub role: String,
    pub output: String,
}

/// The accumulated transcript available to an agent when it executes.
///
/// Purely additive within one run: downstream nodes see everything upstream
/// nodes produced, in the order those results became available. Parallel
/// branches read a cloned snapshot and never see each other's in-flight work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    entries: Vec<ContextEntry>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prior result.
    pub fn push(&mut self, entry: ContextEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the transcript for inclusion in a prompt, with separators
    /// identifying which agent produced which text.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("--- FROM AGENT: {} ---\n{}", e.agent_id, e.output))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The aggregate result of one workflow dispatch: every executed agent's
/// result keyed by id, plus the full closed execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub results: HashMap<String, RunResult>,
    pub log: Vec<CallRecord>,
}

impl WorkflowOutcome {
    /// Whether every executed agent finished with status `Success`.
    pub fn fully_succeeded(&self) -> bool {
        self.results.values().all(|r| r.status.is_success())
    }

    /// Ids of agents that finished `Failed`, for caller-facing summaries.
    pub fn failed_agents(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .results
            .values()
            .filter(|r| r.status.is_failed())
            .map(|r| r.agent_id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}
