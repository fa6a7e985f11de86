//! Structural validation of workflow graphs
//!
//! Checks run in a fixed order and stop at the first problem: empty ids,
//! duplicate ids, dangling dependencies, then cycles.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::types::{Step, Workflow};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("step at position {index} has empty ID")]
    EmptyStepId { index: usize },

    #[error("duplicate step ID: {0}")]
    DuplicateStepId(String),

    #[error("step {step} references non-existent dependency: {dependency}")]
    MissingDependency { step: String, dependency: String },

    #[error("circular dependency detected: {from} -> {to}")]
    CircularDependency { from: String, to: String },

    #[error("failed to parse workflow JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize workflow: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Validate the dependency graph of a workflow
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    validate_steps(&workflow.steps)
}

/// Validate a bare list of steps as if they formed a workflow
pub fn validate_steps(steps: &[Step]) -> Result<(), WorkflowError> {
    let ids = check_ids(steps)?;
    check_references(steps, &ids)?;
    check_cycles(steps)
}

fn check_ids(steps: &[Step]) -> Result<HashSet<&str>, WorkflowError> {
    let mut ids = HashSet::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        if step.id.is_empty() {
            return Err(WorkflowError::EmptyStepId { index });
        }
        if !ids.insert(step.id.as_str()) {
            return Err(WorkflowError::DuplicateStepId(step.id.clone()));
        }
    }
    Ok(ids)
}

fn check_references(steps: &[Step], ids: &HashSet<&str>) -> Result<(), WorkflowError> {
    for step in steps {
        if let Some(dep) = step.depends_on.iter().find(|d| !ids.contains(d.as_str())) {
            return Err(WorkflowError::MissingDependency {
                step: step.id.clone(),
                dependency: dep.clone(),
            });
        }
    }
    Ok(())
}

/// Depth-first search over `depends_on` edges. A node reached again while it
/// is still on the stack closes a cycle. The stack is explicit so chain
/// length never limits the depth.
fn check_cycles(steps: &[Step]) -> Result<(), WorkflowError> {
    let graph: HashMap<&str, &[String]> = steps
        .iter()
        .map(|s| (s.id.as_str(), s.depends_on.as_slice()))
        .collect();

    let mut visited: HashSet<&str> = HashSet::with_capacity(steps.len());
    let mut on_stack: HashSet<&str> = HashSet::new();
    // (node, index of the next dependency to explore)
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for step in steps {
        let root = step.id.as_str();
        if !visited.insert(root) {
            continue;
        }
        on_stack.insert(root);
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            top.1 += 1;

            let deps = graph.get(node).copied().unwrap_or_default();
            let Some(dep) = deps.get(next).map(String::as_str) else {
                on_stack.remove(node);
                stack.pop();
                continue;
            };

            if on_stack.contains(dep) {
                return Err(WorkflowError::CircularDependency {
                    from: node.to_string(),
                    to: dep.to_string(),
                });
            }
            if visited.insert(dep) {
                on_stack.insert(dep);
                stack.push((dep, 0));
            }
        }
    }
    Ok(())
}
