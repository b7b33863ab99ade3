//! Cost-bounded online workflow scheduler (dApollo).
//!
//! [`DApolloScheduler`] owns the current schedule (one [`Mapping`] per task),
//! an arena of [`Proposal`]s and the running cost.  An external driver calls
//! [`schedule()`](DApolloScheduler::schedule) whenever a task becomes ready;
//! each call commits the task's mapping for good and may commit successor
//! tasks with it.
//!
//! # Lifecycle
//! ```text
//! new()        seed cheapest mappings ─► generate proposals ─► adjust ─► advisory bound
//! schedule(t)  finalize t ─► [adjust if dirty] ─► rank ─► greedy subset ─► best proposal for t
//!                 └─ applied group proposal? enqueue the other tasks it moved
//! ```
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | Proposal cross-references | `ProposalId` indices into one arena; the live list is a `Vec<ProposalId>` |
//! | Catalog iteration order | RS instances sorted by name, candidates in declaration order |
//! | Ranking | stable sort by tradeoff, descending, `f64::total_cmp` |
//! | Concurrency | none inside; wrap in [`SharedScheduler`](crate::handle::SharedScheduler) for shared use |
//! | Finalized tasks | never overwritten by a later proposal |
//!
//! # Example
//! ```rust,ignore
//! let cfg = dapollo::config::load_from_file(path)?;
//! let mut engine = DApolloScheduler::new(Arc::new(cfg.workflow), Arc::new(cfg.input))?;
//! for &task in engine.workflow().clone().topological_order() {
//!     engine.schedule(task)?;
//! }
//! let stats = engine.statistics()?;
//! ```

mod adjust;
pub mod cost;
pub mod critical_path;
pub mod error;
pub mod feasibility;
pub mod proposal;

pub use cost::CostModel;
pub use critical_path::CriticalPath;
pub use error::SchedulerError;
pub use proposal::{mapping_string, Mapping, Proposal, ProposalId};

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{RsId, SchedulerInput};
use crate::workflow::{Partition, ResourceId, TaskId, Workflow};

use adjust::adjust_proposals;
use critical_path::group_runtime;
use feasibility::{check_cost_limit, cheapest_schedule_cost};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Absolute tolerance for time comparisons (seconds).
pub(crate) const TOLERANCE: f64 = 0.00001;

// ── Public result types ───────────────────────────────────────────────────────

/// Cost and makespan of the current schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub cost: f64,
    /// Latest LFT over the whole workflow.
    pub makespan: f64,
}

/// Outcome of one [`schedule()`](DApolloScheduler::schedule) call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleReport {
    /// Tasks finalized by this call, in processing order.
    pub finalized: Vec<TaskId>,

    /// Proposals applied by this call, in order.
    pub applied: Vec<ProposalId>,

    /// Already-finalized task that ended the call; queued tasks behind it
    /// were left untouched.
    pub stopped_at: Option<TaskId>,
}

// ── DApolloScheduler ──────────────────────────────────────────────────────────

/// The scheduling engine.  Exclusively owns the schedule state.
#[derive(Debug)]
pub struct DApolloScheduler {
    workflow: Arc<Workflow>,
    input: Arc<SchedulerInput>,

    /// Current mapping per task, indexed by task id.
    current: Vec<Mapping>,

    /// Every proposal ever generated.  Ids stay valid after pruning.
    proposals: Vec<Proposal>,

    /// Proposals still eligible, in ranking order after each sort.
    live: Vec<ProposalId>,

    cost: f64,

    /// The schedule changed since the last adjustment pass.
    proposals_updated: bool,
}

impl DApolloScheduler {
    /// Seed the schedule, generate and adjust proposals.
    ///
    /// Logs (at info) when even the cheapest reachable schedule would exceed
    /// the cost limit; construction still succeeds.
    ///
    /// # Errors
    /// [`SchedulerError::MissingRuntime`] on an inconsistent workflow.
    pub fn new(workflow: Arc<Workflow>, input: Arc<SchedulerInput>) -> Result<Self, SchedulerError> {
        let model = CostModel::new(&workflow, &input);
        let location = input.location_rs;

        // ── Seed: cheapest resource at the primary RS instance ────────────────
        let mut current = Vec::with_capacity(workflow.task_count());
        for task in workflow.task_ids() {
            let resource = model.cheapest_resource(task, location)?;
            current.push(Mapping::new(task, resource, location));
        }
        let overhead = group_runtime(&model, &current, &current, 0.0)? * model.location_rate();
        let cost = model.group_cost(&current, overhead)?;

        // ── Proposals ─────────────────────────────────────────────────────────
        let mut proposals = generate_proposals(&model, &current)?;
        let live: Vec<ProposalId> = (0..proposals.len()).map(ProposalId).collect();
        adjust_proposals(&model, &current, &mut proposals, &live)?;

        // ── Advisory budget check ─────────────────────────────────────────────
        let cheapest = cheapest_schedule_cost(&model, &current, &proposals, &live, overhead)?;
        if let Some(cheapest) = check_cost_limit(cheapest, input.cost_limit) {
            info!(
                cheapest,
                cost_limit = input.cost_limit,
                "No suitable schedule meeting the cost limit"
            );
        }

        info!(
            tasks = workflow.task_count(),
            proposals = proposals.len(),
            cost,
            "dApollo scheduler ready"
        );

        Ok(Self {
            workflow,
            input,
            current,
            proposals,
            live,
            cost,
            proposals_updated: false,
        })
    }

    // ── Public entry point ────────────────────────────────────────────────────

    /// Finalize the mapping of `task`, possibly together with successors moved
    /// by the same proposal.
    ///
    /// If a task taken from the internal queue is already finalized the whole
    /// call ends there, leaving any tasks queued behind it unscheduled; see
    /// [`ScheduleReport::stopped_at`].
    ///
    /// # Errors
    /// * [`SchedulerError::UnknownTask`] if `task` is not part of the workflow.
    /// * [`SchedulerError::MissingRuntime`] on an inconsistent workflow.
    pub fn schedule(&mut self, task: TaskId) -> Result<ScheduleReport, SchedulerError> {
        if !self.workflow.contains(task) {
            return Err(SchedulerError::UnknownTask(task.index()));
        }
        self.run_queue(VecDeque::from([task]))
    }

    fn run_queue(&mut self, mut queue: VecDeque<TaskId>) -> Result<ScheduleReport, SchedulerError> {
        let workflow = Arc::clone(&self.workflow);
        let input = Arc::clone(&self.input);
        let model = CostModel::new(&workflow, &input);
        let mut report = ScheduleReport::default();

        while let Some(task) = queue.pop_front() {
            let name = &workflow.task(task).name;

            if self.current[task.index()].finalized {
                debug!(
                    task = %name,
                    mapping = %self.mapping_string(&[self.current[task.index()]]),
                    "Task already scheduled, stopping"
                );
                report.stopped_at = Some(task);
                break;
            }
            debug!(task = %name, "Starting scheduling of task");

            self.current[task.index()].finalized = true;
            report.finalized.push(task);
            self.update_runtime_of_finished_tasks();

            if self.proposals_updated {
                adjust_proposals(&model, &self.current, &mut self.proposals, &self.live)?;
            }
            self.rank_proposals();

            let subset = self.feasible_subset();
            match self.valid_proposal(&subset, task) {
                Some(id) => {
                    let installed = self.apply_proposal(&model, id, task);
                    report.applied.push(id);
                    let applied = &self.proposals[id.0];
                    if applied.is_group() {
                        // only the tasks that follow the anchor; never the anchor itself
                        let anchor = applied.anchor().task;
                        for t in installed {
                            if t != task && t != anchor && !queue.contains(&t) {
                                debug!(task = %name, includes = %workflow.task(t).name, "Group includes task");
                                queue.push_back(t);
                            }
                        }
                    }
                }
                None => {
                    self.proposals_updated = false;
                    debug!(
                        mapping = %self.mapping_string(&[self.current[task.index()]]),
                        "Keep current mapping"
                    );
                }
            }

            debug!(cost = self.cost, "Current cost");
        }

        Ok(report)
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    /// Sort the live list by tradeoff, best first.  Stable, so equal
    /// tradeoffs keep generation order.
    fn rank_proposals(&mut self) {
        let proposals = &self.proposals;
        self.live
            .sort_by(|a, b| proposals[b.0].tradeoff.total_cmp(&proposals[a.0].tradeoff));
    }

    /// Walk the ranked list and admit every proposal that still fits the
    /// budget (or saves money) and is not nested in an admitted one.
    fn feasible_subset(&self) -> Vec<ProposalId> {
        let mut involved = vec![false; self.proposals.len()];
        let mut running = self.cost;
        let mut subset = Vec::new();

        for &id in &self.live {
            let p = &self.proposals[id.0];
            let affordable = p.ac + running <= self.input.cost_limit || p.ac < 0.0;
            if affordable && !involved[id.0] {
                subset.push(id);
                involved[id.0] = true;
                for other in &p.includes_all {
                    involved[other.0] = true;
                }
                running += p.ac;
            }
        }
        subset
    }

    /// The admitted proposal with the largest positive `ts` that maps `task`
    /// directly or through one of its merged proposals.
    fn valid_proposal(&self, subset: &[ProposalId], task: TaskId) -> Option<ProposalId> {
        let mut best = None;
        let mut max_ts = 0.0;
        for &id in subset {
            let p = &self.proposals[id.0];
            let touches =
                p.maps(task) || p.includes.iter().any(|inc| self.proposals[inc.0].maps(task));
            if touches && max_ts < p.ts {
                best = Some(id);
                max_ts = p.ts;
            }
        }
        best
    }

    // ── Application ───────────────────────────────────────────────────────────

    /// Install a proposal (and its merged proposals) and prune the live list.
    /// Returns the distinct tasks whose mapping was installed, in order.
    fn apply_proposal(&mut self, model: &CostModel<'_>, id: ProposalId, task: TaskId) -> Vec<TaskId> {
        let proposal = &self.proposals[id.0];
        let rs: RsId = proposal.anchor().rs;

        // own mappings first, then merged ones; identical (task, resource)
        // pairs collapse, a later remapping of a task replaces the earlier one
        let mut to_apply: Vec<Mapping> = Vec::new();
        let merged = proposal
            .includes
            .iter()
            .flat_map(|inc| self.proposals[inc.0].mappings.iter());
        for m in proposal.mappings.iter().chain(merged) {
            if !to_apply
                .iter()
                .any(|x| x.task == m.task && x.resource == m.resource)
            {
                to_apply.push(*m);
            }
        }

        let mut installed = Vec::with_capacity(to_apply.len());
        for mut m in to_apply {
            if m.task != task && self.current[m.task.index()].finalized {
                debug!(
                    task = %self.workflow.task(m.task).name,
                    "Task already finalized, mapping skipped"
                );
                continue;
            }
            m.rs = rs;
            m.finalized = m.task == task;
            m.set_by_other_proposal = true;
            self.current[m.task.index()] = m;
            if !installed.contains(&m.task) {
                installed.push(m.task);
            }
        }

        let (ts, ac) = (proposal.ts, proposal.ac);
        self.cost += ac - ts * model.location_rate();

        let current = &self.current;
        let proposals = &self.proposals;
        self.live.retain(|&q| {
            let p = &proposals[q.0];
            let open = p
                .task_includes
                .iter()
                .any(|t| !current[t.index()].set_by_other_proposal);
            let conflicts = p.mappings.iter().any(|m| {
                let cur = &current[m.task.index()];
                cur.set_by_other_proposal && cur.rs != m.rs
            });
            q != id && open && !conflicts
        });
        self.proposals_updated = true;

        let applied: Vec<Mapping> = installed.iter().map(|t| self.current[t.index()]).collect();
        info!(
            task = %self.workflow.task(task).name,
            mappings = %self.mapping_string(&applied),
            ts,
            ac,
            cost = self.cost,
            "Scheduled"
        );

        installed
    }

    /// Hook for folding observed runtimes of finished tasks back into the
    /// model.  Tasks are not executed here, so there is nothing to fold.
    fn update_runtime_of_finished_tasks(&mut self) {}

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Current cost and makespan.
    pub fn statistics(&self) -> Result<Statistics, SchedulerError> {
        let stats = Statistics {
            cost: self.cost,
            makespan: self.critical_path()?.makespan(),
        };
        info!(cost = stats.cost, makespan = stats.makespan, "Workflow results");
        Ok(stats)
    }

    /// EST/LFT of the whole workflow under the current schedule.
    pub fn critical_path(&self) -> Result<CriticalPath, SchedulerError> {
        let model = CostModel::new(&self.workflow, &self.input);
        CriticalPath::analyze(&model, &self.current, &Partition::whole(&self.workflow))
    }

    pub fn mapping(&self, task: TaskId) -> Option<&Mapping> {
        self.current.get(task.index())
    }

    /// Current mapping of every task, indexed by task id.
    pub fn mappings(&self) -> &[Mapping] {
        &self.current
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(id.0)
    }

    /// Live proposals in their latest ranking order.
    pub fn live_proposals(&self) -> impl Iterator<Item = (ProposalId, &Proposal)> + '_ {
        self.live.iter().map(|&id| (id, &self.proposals[id.0]))
    }

    /// `true` if the next call re-runs the adjustment pass first.
    pub fn needs_adjustment(&self) -> bool {
        self.proposals_updated
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    pub fn input(&self) -> &SchedulerInput {
        &self.input
    }

    /// `<task,resource,rs>` rendering of `mappings`.
    pub fn mapping_string(&self, mappings: &[Mapping]) -> String {
        mapping_string(&self.workflow, &self.input, mappings)
    }
}

// ── Proposal generation ───────────────────────────────────────────────────────

/// One solo proposal per (task, alternative resource), plus one group
/// proposal per alternative for every non-exit task.
fn generate_proposals(
    model: &CostModel<'_>,
    current: &[Mapping],
) -> Result<Vec<Proposal>, SchedulerError> {
    let wf = model.workflow;
    let location = model.input.location_rs;
    let cp = CriticalPath::analyze(model, current, &Partition::whole(wf))?;
    let mut proposals = Vec::new();

    for task in wf.task_ids() {
        let cur = current[task.index()];
        for candidate in &wf.task(task).candidates {
            if candidate.resource == cur.resource {
                continue;
            }

            // ── solo: same RS instance, other resource ────────────────────────
            let moved = Mapping::new(task, candidate.resource, location);
            let ts = model.runtime(&cur)? - model.runtime(&moved)?;
            let ac = model.cost(&moved)? - model.cost(&cur)? - ts * model.location_rate();
            proposals.push(Proposal::new(vec![moved], ts, ac, vec![task]));

            // ── group: task and its successors on a new RS instance ───────────
            if wf.is_exit(task) {
                continue;
            }
            let bandwidth = wf.resource(candidate.resource).bandwidth;
            let Some(rs) = model.input.rs_instances.minimizing_communication(bandwidth) else {
                debug!(
                    task = %wf.task(task).name,
                    resource = %wf.resource(candidate.resource).name,
                    "No RS instance fast enough, group proposal skipped"
                );
                continue;
            };
            proposals.push(group_proposal(model, &cp, current, task, candidate.resource, rs)?);
        }
    }

    debug!(count = proposals.len(), "Generated proposals");
    Ok(proposals)
}

/// Move `task` to `resource` at `rs`, and each successor to its cheapest
/// alternative at `rs` that still fits the successor's window.
fn group_proposal(
    model: &CostModel<'_>,
    cp: &CriticalPath,
    current: &[Mapping],
    task: TaskId,
    resource: ResourceId,
    rs: RsId,
) -> Result<Proposal, SchedulerError> {
    let wf = model.workflow;
    let location = model.input.location_rs;
    let successors = wf.successors(task);

    let mut before = vec![current[task.index()]];
    before.extend(successors.iter().map(|s| current[s.index()]));
    let max_output = successors
        .iter()
        .map(|s| wf.task(*s).output_mb)
        .fold(0.0, f64::max);

    let mut after = vec![Mapping::new(task, resource, rs)];
    for &s in successors {
        after.push(fit_successor(model, cp, s, rs)?);
    }

    let transfer = model.transfer_between(wf.task(task).input_mb, location, rs)
        + model.transfer_between(max_output, location, rs);
    let span = group_runtime(model, current, &after, transfer)?;
    let rs_cost = span * model.rs_rate(rs);

    let ts = group_runtime(model, current, &before, 0.0)? - span;
    let ac = model.group_cost(&after, rs_cost)? - model.group_cost(&before, 0.0)?;
    let plain_span = group_runtime(model, current, &after, 0.0)?;

    let mut task_includes = vec![task];
    task_includes.extend_from_slice(successors);

    let mut proposal = Proposal::new(after, ts, ac, task_includes);
    proposal.ts_plain = plain_span;
    proposal.ac_plain = rs_cost;
    Ok(proposal)
}

/// Cheapest mapping of `task` at `rs` whose runtime fits the time the task
/// has: its window minus what it would lose against the fastest option.
/// Falls back to the fastest option when nothing fits.
fn fit_successor(
    model: &CostModel<'_>,
    cp: &CriticalPath,
    task: TaskId,
    rs: RsId,
) -> Result<Mapping, SchedulerError> {
    let mut options = Vec::new();
    for candidate in &model.workflow.task(task).candidates {
        let m = Mapping::new(task, candidate.resource, rs);
        options.push((m, model.runtime(&m)?, model.cost(&m)?));
    }

    let fastest = options
        .iter()
        .fold(None::<&(Mapping, f64, f64)>, |best, opt| match best {
            Some(b) if b.1 <= opt.1 => Some(b),
            _ => Some(opt),
        });
    let Some(&(fastest_mapping, min_duration, _)) = fastest else {
        return Err(SchedulerError::MissingRuntime {
            task: model.workflow.task(task).name.clone(),
            resource: "<any>".to_string(),
        });
    };

    let has_time = cp.lft(task) - cp.est(task) - (cp.runtime(task) - min_duration);
    let mut best: Option<(Mapping, f64)> = None;
    for &(m, runtime, cost) in &options {
        let cheaper = best.map_or(true, |(_, c)| cost < c);
        if runtime <= has_time + TOLERANCE && cheaper {
            best = Some((m, cost));
        }
    }
    Ok(best.map_or(fastest_mapping, |(m, _)| m))
}

// ── Test fixtures ─────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::{RsCatalog, RsInstance, SchedulerInput};
    use crate::workflow::{Resource, ResourceId, TaskId, Workflow, WorkflowBuilder};

    /// Hourly price of "fast" that makes b's move cost 0.5 extra.
    pub(crate) const FAST_CHEAP_RATE: f64 = 9450.0;

    /// Hourly price of "fast" that makes b's move cost 1.5 extra.
    pub(crate) const FAST_PRICEY_RATE: f64 = 10350.0;

    pub(crate) fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    pub(crate) struct Chain {
        pub workflow: Workflow,
        pub input: SchedulerInput,
        pub tasks: [TaskId; 3],
        pub slow: ResourceId,
        pub fast: ResourceId,
    }

    /// a → b → c without any data.  "slow" costs 1 per second and runs every
    /// task in 10 s; "fast" runs a and c in 9 s and b in 4 s.  A single free
    /// RS instance "rs".
    pub(crate) fn chain(fast_rate: f64, cost_limit: f64) -> Chain {
        chain_with(fast_rate, cost_limit, 1e9)
    }

    /// Like [`chain`], with a custom bandwidth for "fast".  Above 1e9 a second
    /// free instance "rs-wide" matching it is added, and fast group proposals
    /// stage there.
    pub(crate) fn chain_with(fast_rate: f64, cost_limit: f64, fast_bandwidth: f64) -> Chain {
        let mut b = WorkflowBuilder::new();
        let slow = b
            .add_resource(Resource {
                name: "slow".into(),
                bandwidth: 1e9,
                acquisition_delay: 0.0,
                cost_per_hour: 3600.0,
            })
            .unwrap();
        let fast = b
            .add_resource(Resource {
                name: "fast".into(),
                bandwidth: fast_bandwidth,
                acquisition_delay: 0.0,
                cost_per_hour: fast_rate,
            })
            .unwrap();

        let mut tasks = Vec::new();
        for (name, fast_runtime) in [("a", 9.0), ("b", 4.0), ("c", 9.0)] {
            let t = b.add_task(name, 0.0, 0.0).unwrap();
            b.add_candidate(t, slow, 10.0).unwrap();
            b.add_candidate(t, fast, fast_runtime).unwrap();
            tasks.push(t);
        }
        b.add_dependency(tasks[0], tasks[1]).unwrap();
        b.add_dependency(tasks[1], tasks[2]).unwrap();

        let free = |name: &str, bandwidth: f64| RsInstance {
            name: name.into(),
            bandwidth,
            acquisition_delay: 0.0,
            cost_per_hour: 0.0,
        };
        let mut instances = vec![free("rs", 1e9)];
        if fast_bandwidth > 1e9 {
            instances.push(free("rs-wide", fast_bandwidth));
        }
        let catalog = RsCatalog::new(instances).unwrap();

        Chain {
            workflow: b.build().unwrap(),
            input: SchedulerInput::new(cost_limit, "rs", catalog).unwrap(),
            tasks: [tasks[0], tasks[1], tasks[2]],
            slow,
            fast,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
