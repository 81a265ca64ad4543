use serde::{Deserialize, Serialize};

/// A named unit of work.
///
/// Agents are constructed once from configuration before execution and are
/// immutable thereafter; each run produces fresh results. The `sub_agents`
/// relation over the whole agent set must form a forest, which the graph
/// validator enforces before the engine ever runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique identifier.
    pub id: String,
    /// Role label, e.g. "Researcher".
    #[serde(default = "default_role")]
    pub role: String,
    /// Goal description, free text used to build the system message.
    #[serde(default = "default_goal")]
    pub goal: String,
    /// Optional fixed instruction text; replaces the default prompt header.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Model backend name, opaque to the engine.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sub-agents to run (in order) before this agent, folding their outputs
    /// into its context.
    #[serde(default)]
    pub sub_agents: Vec<String>,
    /// Capability names this agent may invoke from its reasoning loop.
    #[serde(default)]
    pub toolsets: Vec<String>,
    /// Maximum reasoning-loop iterations (model calls) per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_role() -> String {
    "Agent".to_string()
}

fn default_goal() -> String {
    "Complete the assigned task".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_max_iterations() -> usize {
    5
}

impl AgentSpec {
    /// Create an agent with minimal configuration.
    pub fn new(id: impl Into<String>, role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: goal.into(),
            instruction: None,
            model: default_model(),
            sub_agents: vec![],
            toolsets: vec![],
            max_iterations: default_max_iterations(),
        }
    }

    /// Set the fixed instruction text.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the model backend name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sub-agent ids.
    pub fn with_sub_agents(mut self, ids: Vec<String>) -> Self {
        self.sub_agents = ids;
        self
    }

    /// Set the enabled capability names.
    pub fn with_toolsets(mut self, toolsets: Vec<String>) -> Self {
        self.toolsets = toolsets;
        self
    }

    /// Set the reasoning-loop iteration bound.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Whether the named capability is enabled for this agent.
    pub fn has_toolset(&self, name: &str) -> bool {
        self.toolsets.iter().any(|t| t == name)
    }
}

/// One step in the orchestration graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkflowNode {
    /// A single agent, executed after all prior nodes.
    Step { agent: String },
    /// A group of branches executed concurrently, with an optional follow-up
    /// agent that runs after every branch completes.
    Parallel {
        branches: Vec<String>,
        #[serde(default)]
        then: Option<String>,
    },
}

impl WorkflowNode {
    /// Every agent id referenced by this node.
    pub fn referenced_agents(&self) -> Vec<&str> {
        match self {
            Self::Step { agent } => vec![agent.as_str()],
            Self::Parallel { branches, then } => {
                let mut ids: Vec<&str> = branches.iter().map(String::as_str).collect();
                if let Some(t) = then {
                    ids.push(t.as_str());
                }
                ids
            }
        }
    }
}

/// The top-level ordered sequence of workflow nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub nodes: Vec<WorkflowNode>,
}

impl Workflow {
    /// A purely sequential workflow over the given agent ids.
    pub fn sequential(agents: Vec<String>) -> Self {
        Self {
            nodes: agents
                .into_iter()
                .map(|agent| WorkflowNode::Step { agent })
                .collect(),
        }
    }

    /// A single parallel group with an optional follow-up agent.
    pub fn parallel(branches: Vec<String>, then: Option<String>) -> Self {
        Self {
            nodes: vec![WorkflowNode::Parallel { branches, then }],
        }
    }

    /// Append a node.
    pub fn push(&mut self, node: WorkflowNode) {
        self.nodes.push(node);
    }
}

/// The full validated-document data model handed to the engine: the agent set
/// plus the workflow connecting them. Parsing from YAML/TOML is a collaborator
/// concern; this type only carries the serde derives for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub agents: Vec<AgentSpec>,
    pub workflow: Workflow,
}

impl TeamConfig {
    pub fn new(agents: Vec<AgentSpec>, workflow: Workflow) -> Self {
        Self { agents, workflow }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults_from_json() {
        let agent: AgentSpec = serde_json::from_str(r#"{"id": "researcher"}"#).unwrap();
        assert_eq!(agent.id, "researcher");
        assert_eq!(agent.role, "Agent");
        assert_eq!(agent.goal, "Complete the assigned task");
        assert_eq!(agent.max_iterations, 5);
        assert!(agent.sub_agents.is_empty());
        assert!(agent.toolsets.is_empty());
    }

    #[test]
    fn test_agent_builder() {
        let agent = AgentSpec::new("calc", "Analyst", "Crunch numbers")
            .with_model("gpt-4o-mini")
            .with_toolsets(vec!["calculator".into()])
            .with_max_iterations(3);
        assert_eq!(agent.model, "gpt-4o-mini");
        assert!(agent.has_toolset("calculator"));
        assert!(!agent.has_toolset("python"));
        assert_eq!(agent.max_iterations, 3);
    }

    #[test]
    fn test_workflow_node_tagged_deserialization() {
        let node: WorkflowNode =
            serde_json::from_str(r#"{"type": "step", "agent": "writer"}"#).unwrap();
        assert!(matches!(node, WorkflowNode::Step { ref agent } if agent == "writer"));

        let node: WorkflowNode = serde_json::from_str(
            r#"{"type": "parallel", "branches": ["backend", "frontend"], "then": "reviewer"}"#,
        )
        .unwrap();
        match node {
            WorkflowNode::Parallel { branches, then } => {
                assert_eq!(branches, vec!["backend", "frontend"]);
                assert_eq!(then.as_deref(), Some("reviewer"));
            }
            _ => panic!("expected parallel node"),
        }
    }

    #[test]
    fn test_referenced_agents() {
        let node = WorkflowNode::Parallel {
            branches: vec!["x".into(), "y".into()],
            then: Some("z".into()),
        };
        assert_eq!(node.referenced_agents(), vec!["x", "y", "z"]);

        let step = WorkflowNode::Step { agent: "a".into() };
        assert_eq!(step.referenced_agents(), vec!["a"]);
    }

    #[test]
    fn test_sequential_constructor() {
        let wf = Workflow::sequential(vec!["a".into(), "b".into()]);
        assert_eq!(wf.nodes.len(), 2);
    }
}
