//! Structural validation of the agent set and workflow graph.
//!
//! Validation is a pure function with no side effects: it runs to completion,
//! collects every defect it finds, and no model or tool call is ever issued
//! on an invalid graph.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use tandem_core::config::{AgentSpec, Workflow, WorkflowNode};

/// A structural defect in the team definition. All variants are fatal;
/// execution never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate agent id: '{0}'")]
    DuplicateAgentId(String),

    #[error("{context} references unknown agent '{id}'")]
    UnknownAgentReference { context: String, id: String },

    #[error("cyclic sub_agents: {}", path.join(" -> "))]
    CyclicSubAgents { path: Vec<String> },

    #[error("parallel group at node {index}: {reason}")]
    MalformedParallelGroup { index: usize, reason: String },

    #[error("workflow has no nodes")]
    EmptyWorkflow,
}

/// Validate the full team definition. Returns all defects found, or `Ok(())`
/// when the graph is well-formed.
pub fn validate(
    agents: &[AgentSpec],
    workflow: &Workflow,
) -> std::result::Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Reference integrity (including duplicate agent ids).
    let mut ids: HashSet<&str> = HashSet::new();
    for agent in agents {
        if !ids.insert(agent.id.as_str()) {
            errors.push(ValidationError::DuplicateAgentId(agent.id.clone()));
        }
    }

    for (index, node) in workflow.nodes.iter().enumerate() {
        for id in node.referenced_agents() {
            if !ids.contains(id) {
                errors.push(ValidationError::UnknownAgentReference {
                    context: format!("workflow node {index}"),
                    id: id.to_string(),
                });
            }
        }
    }

    for agent in agents {
        for sub in &agent.sub_agents {
            if !ids.contains(sub.as_str()) {
                errors.push(ValidationError::UnknownAgentReference {
                    context: format!("agent '{}' sub_agents", agent.id),
                    id: sub.clone(),
                });
            }
        }
    }

    // 2. The sub-agent relation must be cycle-free.
    let graph: HashMap<&str, &[String]> = agents
        .iter()
        .map(|a| (a.id.as_str(), a.sub_agents.as_slice()))
        .collect();
    let mut visited: HashSet<&str> = HashSet::new();
    for agent in agents {
        let mut on_path = Vec::new();
        if let Some(path) = find_cycle(agent.id.as_str(), &graph, &mut visited, &mut on_path) {
            errors.push(ValidationError::CyclicSubAgents { path });
        }
    }

    // 3. Parallel group shape.
    for (index, node) in workflow.nodes.iter().enumerate() {
        if let WorkflowNode::Parallel { branches, then } = node {
            if branches.len() < 2 {
                errors.push(ValidationError::MalformedParallelGroup {
                    index,
                    reason: format!("needs at least two branches, has {}", branches.len()),
                });
            }
            let mut seen = HashSet::new();
            for branch in branches {
                if !seen.insert(branch.as_str()) {
                    errors.push(ValidationError::MalformedParallelGroup {
                        index,
                        reason: format!("branch '{branch}' appears more than once"),
                    });
                }
            }
            if let Some(then_id) = then {
                if branches.contains(then_id) {
                    errors.push(ValidationError::MalformedParallelGroup {
                        index,
                        reason: format!("'then' agent '{then_id}' also appears in the branch set"),
                    });
                }
            }
        }
    }

    // 4. The workflow must be non-empty.
    if workflow.nodes.is_empty() {
        errors.push(ValidationError::EmptyWorkflow);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Depth-first search from `node` over the sub-agent relation. Returns the
/// cycle path the first time a node already on the current path is revisited.
/// References to undefined agents are reported separately and skipped here.
fn find_cycle<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a [String]>,
    visited: &mut HashSet<&'a str>,
    on_path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    if let Some(pos) = on_path.iter().position(|n| *n == node) {
        let mut path: Vec<String> = on_path[pos..].iter().map(|s| s.to_string()).collect();
        path.push(node.to_string());
        return Some(path);
    }
    if !visited.insert(node) {
        return None;
    }

    on_path.push(node);
    if let Some(subs) = graph.get(node) {
        for sub in subs.iter() {
            if graph.contains_key(sub.as_str()) {
                if let Some(path) = find_cycle(sub.as_str(), graph, visited, on_path) {
                    return Some(path);
                }
            }
        }
    }
    on_path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::config::AgentSpec;

    fn agent(id: &str) -> AgentSpec {
        AgentSpec::new(id, "Agent", "test")
    }

    #[test]
    fn test_valid_team_passes() {
        let agents = vec![agent("a"), agent("b"), agent("c")];
        let workflow = Workflow {
            nodes: vec![
                WorkflowNode::Step { agent: "a".into() },
                WorkflowNode::Parallel {
                    branches: vec!["b".into(), "c".into()],
                    then: Some("a".into()),
                },
            ],
        };
        assert!(validate(&agents, &workflow).is_ok());
    }

    #[test]
    fn test_unknown_step_reference() {
        let agents = vec![agent("a")];
        let workflow = Workflow::sequential(vec!["a".into(), "ghost".into()]);
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownAgentReference { id, .. } if id == "ghost"
        )));
    }

    #[test]
    fn test_unknown_sub_agent_reference() {
        let agents = vec![agent("a").with_sub_agents(vec!["missing".into()])];
        let workflow = Workflow::sequential(vec!["a".into()]);
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownAgentReference { context, id }
                if context == "agent 'a' sub_agents" && id == "missing"
        )));
    }

    #[test]
    fn test_duplicate_agent_id() {
        let agents = vec![agent("a"), agent("a")];
        let workflow = Workflow::sequential(vec!["a".into()]);
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateAgentId(id) if id == "a")));
    }

    #[test]
    fn test_sub_agent_cycle_rejected() {
        let agents = vec![
            agent("a").with_sub_agents(vec!["b".into()]),
            agent("b").with_sub_agents(vec!["c".into()]),
            agent("c").with_sub_agents(vec!["a".into()]),
        ];
        let workflow = Workflow::sequential(vec!["a".into()]);
        let errors = validate(&agents, &workflow).unwrap_err();
        let cycle = errors
            .iter()
            .find_map(|e| match e {
                ValidationError::CyclicSubAgents { path } => Some(path),
                _ => None,
            })
            .expect("cycle reported");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() >= 3);
    }

    #[test]
    fn test_self_cycle_rejected() {
        let agents = vec![agent("a").with_sub_agents(vec!["a".into()])];
        let workflow = Workflow::sequential(vec!["a".into()]);
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CyclicSubAgents { path } if path == &vec!["a".to_string(), "a".to_string()])));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // a -> b, a -> c, b -> d, c -> d: shared sub-agent, no cycle
        let agents = vec![
            agent("a").with_sub_agents(vec!["b".into(), "c".into()]),
            agent("b").with_sub_agents(vec!["d".into()]),
            agent("c").with_sub_agents(vec!["d".into()]),
            agent("d"),
        ];
        let workflow = Workflow::sequential(vec!["a".into()]);
        assert!(validate(&agents, &workflow).is_ok());
    }

    #[test]
    fn test_single_branch_parallel_group() {
        let agents = vec![agent("a")];
        let workflow = Workflow::parallel(vec!["a".into()], None);
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MalformedParallelGroup { index: 0, .. })));
    }

    #[test]
    fn test_then_inside_branch_set() {
        let agents = vec![agent("a"), agent("b")];
        let workflow = Workflow::parallel(vec!["a".into(), "b".into()], Some("b".into()));
        let errors = validate(&agents, &workflow).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::MalformedParallelGroup { reason, .. } if reason.contains("'then'")
        )));
    }

    #[test]
    fn test_empty_workflow() {
        let agents = vec![agent("a")];
        let workflow = Workflow::default();
        let errors = validate(&agents, &workflow).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyWorkflow]);
    }
}
