/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core workflow data structures for the dApollo scheduler.
//!
//! A [`Workflow`] is the task-only projection of a workflow graph:
//!
//! ```text
//! config (YAML) ──► WorkflowBuilder ──► Workflow ──(Arc)──► DApolloScheduler
//!                      validates          immutable
//! ```
//!
//! # Ownership model
//! A `Workflow` is built once, validated, and then shared read-only (behind an
//! `Arc`) with the scheduling engine.  Nothing in the engine ever mutates it:
//! task attributes, resource attributes and the declared per-(task, resource)
//! runtimes are fixed at build time.
//!
//! Tasks are stored in a `petgraph` [`DiGraph`]; a [`TaskId`] is the node
//! index of the task in that graph.  Because the builder never removes nodes,
//! task ids are dense (`0..task_count`) and can index plain `Vec`s.

pub mod dag;

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

pub use dag::Partition;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Identifier of a task: its node index in the workflow graph.
pub type TaskId = NodeIndex;

/// Identifier of a compute resource: its position in [`Workflow::resources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

// ── Resource ──────────────────────────────────────────────────────────────────

/// A candidate execution target for tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Unique resource type name (e.g. `"edge"`, `"cloud"`).
    pub name: String,

    /// Network bandwidth in bits per second.
    pub bandwidth: f64,

    /// Time in seconds needed to acquire the resource before the task starts.
    pub acquisition_delay: f64,

    /// Price of one hour on this resource.
    pub cost_per_hour: f64,
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// One resource a task may run on, with the declared runtime of that pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub resource: ResourceId,

    /// Declared execution time of the task on `resource`, in seconds.
    pub runtime: f64,
}

/// A workflow task (DAG node).
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique task name within the workflow.
    pub name: String,

    /// Size of the task's input data in MB.
    pub input_mb: f64,

    /// Size of the task's output data in MB.
    pub output_mb: f64,

    /// Every resource this task may be mapped to, in declaration order.
    ///
    /// Declaration order matters: it is the tie-break order whenever the
    /// scheduler looks for the first cheapest / fastest alternative.
    pub candidates: Vec<Candidate>,
}

impl Task {
    /// Declared runtime of this task on `resource`, if that pairing exists.
    pub fn declared_runtime(&self, resource: ResourceId) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.resource == resource)
            .map(|c| c.runtime)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a workflow description is rejected by [`WorkflowBuilder`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("task '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// The dependency relation is not acyclic; `task` is one node on a cycle.
    #[error("dependency cycle detected at task '{task}'")]
    Cycle { task: String },

    #[error("task '{0}' has no candidate resource")]
    NoCandidates(String),

    /// A size, runtime, bandwidth, delay or price is negative, NaN or infinite
    /// (bandwidths must also be strictly positive).
    #[error("invalid value {value} for {field} of '{owner}'")]
    InvalidValue {
        owner: String,
        field: &'static str,
        value: f64,
    },
}

// ── Workflow ──────────────────────────────────────────────────────────────────

/// Immutable, validated task DAG plus the resource catalog it refers to.
#[derive(Debug, Clone)]
pub struct Workflow {
    graph: DiGraph<Task, ()>,
    resources: Vec<Resource>,
    /// Immediate predecessors per task, sorted and de-duplicated.
    preds: Vec<Vec<TaskId>>,
    /// Immediate successors per task, sorted and de-duplicated.
    succs: Vec<Vec<TaskId>>,
    /// One topological order of all tasks, fixed at build time.
    order: Vec<TaskId>,
    task_index: HashMap<String, TaskId>,
}

impl Workflow {
    /// Number of tasks in the DAG.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All task ids in ascending (declaration) order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.node_indices()
    }

    /// Returns `true` if `id` names a task of this workflow.
    pub fn contains(&self, id: TaskId) -> bool {
        id.index() < self.graph.node_count()
    }

    /// The task behind `id`.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this workflow; use
    /// [`contains`](Self::contains) to check ids coming from outside.
    pub fn task(&self, id: TaskId) -> &Task {
        &self.graph[id]
    }

    /// Look up a task by name.
    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.task_index.get(name).copied()
    }

    /// The resource behind `id`.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this workflow.
    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    /// All resources, indexable by [`ResourceId`].
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Look up a resource by name.
    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.name == name)
            .map(ResourceId)
    }
}

// ── WorkflowBuilder ───────────────────────────────────────────────────────────

/// Incrementally assembles and validates a [`Workflow`].
///
/// # Example
/// ```rust
/// use dapollo::workflow::{Resource, WorkflowBuilder};
///
/// let mut b = WorkflowBuilder::new();
/// let edge = b.add_resource(Resource {
///     name: "edge".into(),
///     bandwidth: 1e8,
///     acquisition_delay: 0.0,
///     cost_per_hour: 0.1,
/// }).unwrap();
/// let split = b.add_task("split", 1.0, 1.0).unwrap();
/// let merge = b.add_task("merge", 1.0, 0.5).unwrap();
/// b.add_candidate(split, edge, 10.0).unwrap();
/// b.add_candidate(merge, edge, 5.0).unwrap();
/// b.add_dependency(split, merge).unwrap();
///
/// let wf = b.build().unwrap();
/// assert_eq!(wf.entry_tasks(), vec![split]);
/// assert_eq!(wf.exit_tasks(), vec![merge]);
/// ```
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    graph: DiGraph<Task, ()>,
    resources: Vec<Resource>,
    task_index: HashMap<String, TaskId>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type and return its id.
    pub fn add_resource(&mut self, resource: Resource) -> Result<ResourceId, WorkflowError> {
        if self.resources.iter().any(|r| r.name == resource.name) {
            return Err(WorkflowError::DuplicateResource(resource.name));
        }
        check_positive(&resource.name, "bandwidth", resource.bandwidth)?;
        check_non_negative(&resource.name, "acquisition_delay", resource.acquisition_delay)?;
        check_non_negative(&resource.name, "cost_per_hour", resource.cost_per_hour)?;

        self.resources.push(resource);
        Ok(ResourceId(self.resources.len() - 1))
    }

    /// Add a task with its data sizes (MB).  Candidates are added separately.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        input_mb: f64,
        output_mb: f64,
    ) -> Result<TaskId, WorkflowError> {
        let name = name.into();
        if self.task_index.contains_key(&name) {
            return Err(WorkflowError::DuplicateTask(name));
        }
        check_non_negative(&name, "input_mb", input_mb)?;
        check_non_negative(&name, "output_mb", output_mb)?;

        let id = self.graph.add_node(Task {
            name: name.clone(),
            input_mb,
            output_mb,
            candidates: Vec::new(),
        });
        self.task_index.insert(name, id);
        Ok(id)
    }

    /// Declare that `task` may run on `resource` for `runtime` seconds.
    ///
    /// Declaring the same pairing twice replaces the earlier runtime.
    pub fn add_candidate(
        &mut self,
        task: TaskId,
        resource: ResourceId,
        runtime: f64,
    ) -> Result<(), WorkflowError> {
        if resource.0 >= self.resources.len() {
            return Err(WorkflowError::UnknownResource(format!("#{}", resource.0)));
        }
        let node = self
            .graph
            .node_weight_mut(task)
            .ok_or_else(|| WorkflowError::UnknownTask(format!("#{}", task.index())))?;
        check_non_negative(&node.name, "runtime", runtime)?;

        match node.candidates.iter_mut().find(|c| c.resource == resource) {
            Some(existing) => existing.runtime = runtime,
            None => node.candidates.push(Candidate { resource, runtime }),
        }
        Ok(())
    }

    /// Declare that `to` consumes the output of `from`.
    pub fn add_dependency(&mut self, from: TaskId, to: TaskId) -> Result<(), WorkflowError> {
        for id in [from, to] {
            if self.graph.node_weight(id).is_none() {
                return Err(WorkflowError::UnknownTask(format!("#{}", id.index())));
            }
        }
        if from == to {
            return Err(WorkflowError::SelfDependency(self.graph[from].name.clone()));
        }
        // update_edge keeps at most one edge per ordered pair
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Id of an already-added task, by name.
    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.task_index.get(name).copied()
    }

    /// Id of an already-added resource, by name.
    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.name == name)
            .map(ResourceId)
    }

    /// Validate and freeze the workflow.
    ///
    /// # Errors
    /// * [`WorkflowError::NoCandidates`] if a task has no resource to run on.
    /// * [`WorkflowError::Cycle`] if the dependencies are not acyclic.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        if let Some(task) = self.graph.node_weights().find(|t| t.candidates.is_empty()) {
            return Err(WorkflowError::NoCandidates(task.name.clone()));
        }

        let order = toposort(&self.graph, None).map_err(|cycle| WorkflowError::Cycle {
            task: self.graph[cycle.node_id()].name.clone(),
        })?;

        let n = self.graph.node_count();
        let mut preds = vec![Vec::new(); n];
        let mut succs = vec![Vec::new(); n];
        for edge in self.graph.raw_edges() {
            succs[edge.source().index()].push(edge.target());
            preds[edge.target().index()].push(edge.source());
        }
        for list in preds.iter_mut().chain(succs.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Workflow {
            graph: self.graph,
            resources: self.resources,
            preds,
            succs,
            order,
            task_index: self.task_index,
        })
    }
}

fn check_non_negative(owner: &str, field: &'static str, value: f64) -> Result<(), WorkflowError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(WorkflowError::InvalidValue {
            owner: owner.to_string(),
            field,
            value,
        })
    }
}

fn check_positive(owner: &str, field: &'static str, value: f64) -> Result<(), WorkflowError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(WorkflowError::InvalidValue {
            owner: owner.to_string(),
            field,
            value,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
