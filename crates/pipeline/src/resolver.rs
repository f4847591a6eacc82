//! Execution-order resolution for a pipeline's tasks.
//!
//! Both policies return an order in which every task follows all of its
//! predecessors:
//!
//! - [`ExecutionPolicy::Sequential`] keeps declaration order and rejects any
//!   predecessor that is not declared strictly earlier.
//! - [`ExecutionPolicy::DependencyOrdered`] is a Kahn topological sort. When
//!   several tasks are ready at once the earliest-declared goes first, so the
//!   order is deterministic.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{DefinitionError, ExecutionPolicy, Task, TaskId};

/// Computes the execution order for `tasks` under `policy`.
pub fn resolve_order(
    tasks: &[Task],
    policy: ExecutionPolicy,
) -> Result<Vec<TaskId>, DefinitionError> {
    let index = index_tasks(tasks)?;
    check_predecessors(tasks, &index)?;

    match policy {
        ExecutionPolicy::Sequential => sequential_order(tasks, &index),
        ExecutionPolicy::DependencyOrdered => topological_order(tasks, &index),
    }
}

fn index_tasks(tasks: &[Task]) -> Result<HashMap<&TaskId, usize>, DefinitionError> {
    let mut index = HashMap::with_capacity(tasks.len());
    for (position, task) in tasks.iter().enumerate() {
        if index.insert(&task.id, position).is_some() {
            return Err(DefinitionError::DuplicateTask {
                task: task.id.clone(),
            });
        }
    }
    Ok(index)
}

fn check_predecessors(
    tasks: &[Task],
    index: &HashMap<&TaskId, usize>,
) -> Result<(), DefinitionError> {
    for task in tasks {
        let mut seen = HashSet::new();
        for predecessor in &task.predecessors {
            if !index.contains_key(predecessor) {
                return Err(DefinitionError::UnknownPredecessor {
                    task: task.id.clone(),
                    predecessor: predecessor.clone(),
                });
            }
            if !seen.insert(predecessor) {
                return Err(DefinitionError::DuplicatePredecessor {
                    task: task.id.clone(),
                    predecessor: predecessor.clone(),
                });
            }
        }
    }
    Ok(())
}

fn sequential_order(
    tasks: &[Task],
    index: &HashMap<&TaskId, usize>,
) -> Result<Vec<TaskId>, DefinitionError> {
    for (position, task) in tasks.iter().enumerate() {
        for predecessor in &task.predecessors {
            if index[predecessor] >= position {
                return Err(DefinitionError::PredecessorNotEarlier {
                    task: task.id.clone(),
                    predecessor: predecessor.clone(),
                });
            }
        }
    }
    Ok(tasks.iter().map(|t| t.id.clone()).collect())
}

fn topological_order(
    tasks: &[Task],
    index: &HashMap<&TaskId, usize>,
) -> Result<Vec<TaskId>, DefinitionError> {
    let mut unmet: Vec<usize> = tasks.iter().map(|t| t.predecessors.len()).collect();
    let mut dependants: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (position, task) in tasks.iter().enumerate() {
        for predecessor in &task.predecessors {
            dependants[index[predecessor]].push(position);
        }
    }

    // Ordered by declaration position: the smallest ready index runs next.
    let mut ready: BTreeSet<usize> = (0..tasks.len()).filter(|&i| unmet[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(next) = ready.pop_first() {
        order.push(tasks[next].id.clone());
        for &dependant in &dependants[next] {
            unmet[dependant] -= 1;
            if unmet[dependant] == 0 {
                ready.insert(dependant);
            }
        }
    }

    if order.len() < tasks.len() {
        let stuck = tasks
            .iter()
            .enumerate()
            .filter(|(i, _)| unmet[*i] > 0)
            .map(|(_, t)| t.id.clone())
            .collect();
        return Err(DefinitionError::CyclicDependency { tasks: stuck });
    }

    Ok(order)
}
