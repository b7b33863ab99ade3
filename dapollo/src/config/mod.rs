//! Workflow description loading and the immutable scheduler input.
//!
//! A single YAML document (JSON works too) describes the task DAG, the
//! compute resource types the tasks may run on, and the catalog of RS
//! (remote-site) instances used for data staging:
//!
//! ```yaml
//! cost_limit: 0.05
//! location_rs: rs-edge
//! exclude_data_transfer_cost: false
//! tasks:
//!   - id: split
//!     input_mb: 10.0
//!     output_mb: 4.0
//!     after: []
//!     resource_types:
//!       - { id: edge,  runtime: 12.0 }
//!       - { id: cloud, runtime: 3.0 }
//! task_resource_types:
//!   - { id: edge,  cost_per_hour: 0.01, bandwidth: 1.0e8, acquisition_delay: 0.0 }
//!   - { id: cloud, cost_per_hour: 0.09, bandwidth: 1.0e9, acquisition_delay: 2.0 }
//! rs_resource_types:
//!   - { id: rs-edge, cost_per_hour: 0.0, bandwidth: 1.0e8, acquisition_delay: 0.0 }
//! ```
//!
//! The camelCase spellings used by JSON scheduler inputs (`costLimit`,
//! `locationRS`, `inputMB`, `taskResourceTypes`, ...) are accepted as aliases.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::workflow::{Resource, Workflow, WorkflowBuilder};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the file layout.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    #[serde(alias = "costLimit")]
    cost_limit: f64,

    #[serde(alias = "locationRS")]
    location_rs: String,

    #[serde(default, alias = "excludeDataTransferCost")]
    exclude_data_transfer_cost: bool,

    tasks: Vec<TaskEntry>,

    #[serde(alias = "taskResourceTypes")]
    task_resource_types: Vec<ResourceTypeEntry>,

    #[serde(alias = "RSResourceTypes")]
    rs_resource_types: Vec<ResourceTypeEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    id: String,

    #[serde(default, alias = "inputMB")]
    input_mb: f64,

    #[serde(default, alias = "outputMB")]
    output_mb: f64,

    /// Predecessor task ids.
    #[serde(default)]
    after: Vec<String>,

    #[serde(alias = "resourceTypes")]
    resource_types: Vec<RuntimeEntry>,
}

#[derive(Debug, Deserialize)]
struct RuntimeEntry {
    id: String,
    runtime: f64,
}

/// Shared shape of task resource types and RS instance types.
#[derive(Debug, Deserialize)]
struct ResourceTypeEntry {
    id: String,

    #[serde(alias = "costPerHour")]
    cost_per_hour: f64,

    bandwidth: f64,

    #[serde(default, alias = "acquisitionDelay")]
    acquisition_delay: f64,
}

// ── RS instances ──────────────────────────────────────────────────────────────

/// Index of an RS instance inside an [`RsCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RsId(pub(crate) usize);

impl RsId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named data-staging location.
#[derive(Debug, Clone, PartialEq)]
pub struct RsInstance {
    pub name: String,

    /// Bits per second.
    pub bandwidth: f64,

    /// Seconds.
    pub acquisition_delay: f64,

    pub cost_per_hour: f64,
}

/// RS instance catalog, ordered by instance name.
///
/// The fixed order makes every "first of the minimal ones" pick reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct RsCatalog {
    instances: Vec<RsInstance>,
}

impl RsCatalog {
    /// Build a catalog.
    ///
    /// # Errors
    /// Fails on an empty catalog, a repeated name, or a non-positive bandwidth.
    pub fn new(mut instances: Vec<RsInstance>) -> Result<Self> {
        if instances.is_empty() {
            bail!("RS instance catalog is empty");
        }
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in instances.windows(2) {
            if pair[0].name == pair[1].name {
                bail!("RS instance '{}' is declared more than once", pair[0].name);
            }
        }
        for rs in &instances {
            if !(rs.bandwidth.is_finite() && rs.bandwidth > 0.0) {
                bail!("RS instance '{}' has invalid bandwidth {}", rs.name, rs.bandwidth);
            }
            if !(rs.acquisition_delay >= 0.0 && rs.cost_per_hour >= 0.0) {
                bail!("RS instance '{}' has a negative delay or price", rs.name);
            }
        }
        Ok(Self { instances })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// # Panics
    /// Panics if `id` was not issued by this catalog.
    pub fn get(&self, id: RsId) -> &RsInstance {
        &self.instances[id.0]
    }

    pub fn id_of(&self, name: &str) -> Option<RsId> {
        self.instances
            .binary_search_by(|rs| rs.name.as_str().cmp(name))
            .ok()
            .map(RsId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RsId, &RsInstance)> {
        self.instances.iter().enumerate().map(|(i, rs)| (RsId(i), rs))
    }

    /// The RS instance a resource with `bandwidth` should stage its data on.
    ///
    /// Among instances at least as fast as `bandwidth`, keep those with the
    /// smallest acquisition delay, then the cheapest of those; the first by
    /// name wins.  `None` when no instance is fast enough.
    pub fn minimizing_communication(&self, bandwidth: f64) -> Option<RsId> {
        let fast_enough = || self.iter().filter(move |(_, rs)| rs.bandwidth >= bandwidth);

        let min_delay = fast_enough()
            .map(|(_, rs)| rs.acquisition_delay)
            .min_by(f64::total_cmp)?;
        let min_cost = fast_enough()
            .filter(|(_, rs)| rs.acquisition_delay == min_delay)
            .map(|(_, rs)| rs.cost_per_hour)
            .min_by(f64::total_cmp)?;

        fast_enough()
            .find(|(_, rs)| rs.acquisition_delay == min_delay && rs.cost_per_hour == min_cost)
            .map(|(id, _)| id)
    }
}

// ── SchedulerInput ────────────────────────────────────────────────────────────

/// Run configuration of one scheduler instance.  Never mutated by scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerInput {
    /// Hard budget used by greedy admission.
    pub cost_limit: f64,

    /// RS instance hosting data intake and egress.
    pub location_rs: RsId,

    pub rs_instances: RsCatalog,

    /// When set, billed time is the declared runtime only (no acquisition
    /// delay, no transfer time).
    pub exclude_data_transfer_cost: bool,
}

impl SchedulerInput {
    /// # Errors
    /// Fails if `location_rs` is not in `rs_instances`.
    pub fn new(cost_limit: f64, location_rs: &str, rs_instances: RsCatalog) -> Result<Self> {
        let location_rs = rs_instances
            .id_of(location_rs)
            .with_context(|| format!("Unknown primary RS instance '{location_rs}'"))?;
        Ok(Self {
            cost_limit,
            location_rs,
            rs_instances,
            exclude_data_transfer_cost: false,
        })
    }

    pub fn with_cost_limit(mut self, cost_limit: f64) -> Self {
        self.cost_limit = cost_limit;
        self
    }

    pub fn with_exclude_data_transfer_cost(mut self, exclude: bool) -> Self {
        self.exclude_data_transfer_cost = exclude;
        self
    }

    /// The primary RS instance.
    pub fn location(&self) -> &RsInstance {
        self.rs_instances.get(self.location_rs)
    }
}

// ── WorkflowConfig ────────────────────────────────────────────────────────────

/// Everything one scheduler run needs.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub workflow: Workflow,
    pub input: SchedulerInput,
}

/// Read and validate a workflow description file.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid YAML/JSON, or
/// describes an inconsistent workflow.
pub fn load_from_file(path: &Path) -> Result<WorkflowConfig> {
    info!("Loading workflow description from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open workflow file: {}", path.display()))?;

    from_yaml_str(&content).with_context(|| format!("Invalid workflow file: {}", path.display()))
}

/// Parse and validate a workflow description held in memory.
pub fn from_yaml_str(content: &str) -> Result<WorkflowConfig> {
    let file: WorkflowFile =
        serde_yaml::from_str(content).context("Failed to parse workflow description")?;

    let mut builder = WorkflowBuilder::new();

    for entry in &file.task_resource_types {
        builder.add_resource(Resource {
            name: entry.id.clone(),
            bandwidth: entry.bandwidth,
            acquisition_delay: entry.acquisition_delay,
            cost_per_hour: entry.cost_per_hour,
        })?;
    }

    for entry in &file.tasks {
        let task = builder.add_task(entry.id.as_str(), entry.input_mb, entry.output_mb)?;
        for rt in &entry.resource_types {
            let resource = builder.resource_id(&rt.id).with_context(|| {
                format!("Task '{}' refers to unknown resource type '{}'", entry.id, rt.id)
            })?;
            builder.add_candidate(task, resource, rt.runtime)?;
        }
        debug!(
            "  Task: {} | in: {}MB | out: {}MB | candidates: {}",
            entry.id,
            entry.input_mb,
            entry.output_mb,
            entry.resource_types.len(),
        );
    }

    for entry in &file.tasks {
        let mut seen = HashSet::new();
        for pred in entry.after.iter().filter(|p| seen.insert(p.as_str())) {
            let from = builder.task_id(pred).with_context(|| {
                format!("Task '{}' depends on unknown task '{}'", entry.id, pred)
            })?;
            let to = builder
                .task_id(&entry.id)
                .with_context(|| format!("Task '{}' vanished while wiring", entry.id))?;
            builder.add_dependency(from, to)?;
        }
    }

    let workflow = builder.build()?;

    let catalog = RsCatalog::new(
        file.rs_resource_types
            .into_iter()
            .map(|e| RsInstance {
                name: e.id,
                bandwidth: e.bandwidth,
                acquisition_delay: e.acquisition_delay,
                cost_per_hour: e.cost_per_hour,
            })
            .collect(),
    )?;
    let input = SchedulerInput::new(file.cost_limit, &file.location_rs, catalog)?
        .with_exclude_data_transfer_cost(file.exclude_data_transfer_cost);

    info!(
        "Loaded workflow: {} task(s), {} resource type(s), {} RS instance(s), cost limit {}",
        workflow.task_count(),
        workflow.resources().len(),
        input.rs_instances.len(),
        input.cost_limit,
    );

    Ok(WorkflowConfig { workflow, input })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
