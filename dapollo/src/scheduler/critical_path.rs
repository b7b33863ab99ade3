/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Earliest-start / latest-finish analysis under a given schedule.
//!
//! # Forward pass (EST)
//! Entry tasks of the analysed subset start after their input reaches them
//! from the primary RS instance.  Every other member starts when its slowest
//! predecessor in the subset finishes, plus the time to move its input across
//! RS instances when the two tasks stage data on different instances:
//!
//! ```text
//! EST(t) = max_p ( EST(p) + runtime(p) + [rs(p) ≠ rs(t)] · xfer(input(t)) )
//! ```
//!
//! # Backward pass (LFT)
//! Every exit task of the subset must finish at the subset's overall finish
//! time; other members must leave their successors enough room:
//!
//! ```text
//! LFT(exit) = max_t ( EST(t) + runtime(t) )
//! LFT(t)    = min_s ( LFT(s) - runtime(s) )
//! ```
//!
//! Members are visited in the workflow's topological order, so each pass is a
//! single sweep.

use crate::workflow::{Partition, TaskId};

use super::cost::CostModel;
use super::error::SchedulerError;
use super::proposal::Mapping;

/// EST/LFT of every task in an analysed subset.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalPath {
    est: Vec<f64>,
    lft: Vec<f64>,
    runtime: Vec<f64>,
    members: Vec<TaskId>,
}

impl CriticalPath {
    /// Analyse `part` under `schedule` (indexed by task id).
    ///
    /// # Errors
    /// [`SchedulerError::MissingRuntime`] if a member's mapping is undeclared.
    pub fn analyze(
        model: &CostModel<'_>,
        schedule: &[Mapping],
        part: &Partition,
    ) -> Result<Self, SchedulerError> {
        let wf = model.workflow;
        let n = wf.task_count();
        let mut est = vec![0.0; n];
        let mut lft = vec![0.0; n];
        let mut runtime = vec![0.0; n];

        for &t in part.members() {
            runtime[t.index()] = model.runtime(&schedule[t.index()])?;
        }

        // ── forward ───────────────────────────────────────────────────────────
        for &t in part.members() {
            let cur = &schedule[t.index()];
            est[t.index()] = if part.is_entry(wf, t) {
                let staged = Mapping::new(t, cur.resource, model.input.location_rs);
                model.transfer_time(&staged, true, false)
            } else {
                part.predecessors(wf, t)
                    .map(|p| {
                        let prev = &schedule[p.index()];
                        let xfer = if prev.rs != cur.rs {
                            model.transfer_between(wf.task(t).input_mb, cur.rs, prev.rs)
                        } else {
                            0.0
                        };
                        est[p.index()] + runtime[p.index()] + xfer
                    })
                    .fold(0.0, f64::max)
            };
        }

        // ── backward ──────────────────────────────────────────────────────────
        let finish = part
            .members()
            .iter()
            .map(|t| est[t.index()] + runtime[t.index()])
            .fold(0.0, f64::max);

        for &t in part.members().iter().rev() {
            lft[t.index()] = if part.is_exit(wf, t) {
                finish
            } else {
                part.successors(wf, t)
                    .map(|s| lft[s.index()] - runtime[s.index()])
                    .fold(f64::MAX, f64::min)
            };
        }

        Ok(Self {
            est,
            lft,
            runtime,
            members: part.members().to_vec(),
        })
    }

    /// EST of `task`; `0.0` outside the analysed subset.
    pub fn est(&self, task: TaskId) -> f64 {
        self.est.get(task.index()).copied().unwrap_or(0.0)
    }

    /// LFT of `task`; `0.0` outside the analysed subset.
    pub fn lft(&self, task: TaskId) -> f64 {
        self.lft.get(task.index()).copied().unwrap_or(0.0)
    }

    /// Runtime of `task`'s mapping at analysis time.
    pub fn runtime(&self, task: TaskId) -> f64 {
        self.runtime.get(task.index()).copied().unwrap_or(0.0)
    }

    /// `LFT − EST − runtime`.
    pub fn slack(&self, task: TaskId) -> f64 {
        self.lft(task) - self.est(task) - self.runtime(task)
    }

    /// Latest LFT over the subset, i.e. its finish time.
    pub fn makespan(&self) -> f64 {
        self.members
            .iter()
            .map(|&t| self.lft(t))
            .fold(0.0, f64::max)
    }

    pub fn members(&self) -> &[TaskId] {
        &self.members
    }
}

/// Critical-path span a mapping set would occupy: install `group` over a copy
/// of `schedule`, analyse only the group's tasks and return
/// `max LFT − min EST + epsilon`.
pub fn group_runtime(
    model: &CostModel<'_>,
    schedule: &[Mapping],
    group: &[Mapping],
    epsilon: f64,
) -> Result<f64, SchedulerError> {
    let mut trial = schedule.to_vec();
    for m in group {
        trial[m.task.index()] = *m;
    }
    let part = Partition::of(model.workflow, group.iter().map(|m| m.task));
    let cp = CriticalPath::analyze(model, &trial, &part)?;

    let max_lft = group.iter().map(|m| cp.lft(m.task)).fold(0.0, f64::max);
    let min_est = group
        .iter()
        .map(|m| cp.est(m.task))
        .fold(f64::MAX, f64::min);
    Ok(max_lft - min_est + epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RsCatalog, RsId, RsInstance, SchedulerInput};
    use crate::workflow::{Resource, ResourceId, Workflow, WorkflowBuilder};

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    /// a → {b, c} → d.  Runtimes 2, 5, 3, 1 on the single resource; every
    /// task reads 8 MB, so a hop within "home" is nearly free while a hop
    /// to or from "away" (16 bit/s) costs 4 s.
    fn diamond() -> (Workflow, SchedulerInput, [TaskId; 4]) {
        let mut b = WorkflowBuilder::new();
        let r = b
            .add_resource(Resource {
                name: "vm".into(),
                bandwidth: 1e12,
                acquisition_delay: 0.0,
                cost_per_hour: 0.0,
            })
            .unwrap();
        let mut ids = Vec::new();
        for (name, rt) in [("a", 2.0), ("b", 5.0), ("c", 3.0), ("d", 1.0)] {
            let t = b.add_task(name, 8.0, 0.0).unwrap();
            b.add_candidate(t, r, rt).unwrap();
            ids.push(t);
        }
        let [a, bb, c, d] = [ids[0], ids[1], ids[2], ids[3]];
        b.add_dependency(a, bb).unwrap();
        b.add_dependency(a, c).unwrap();
        b.add_dependency(bb, d).unwrap();
        b.add_dependency(c, d).unwrap();
        let wf = b.build().unwrap();

        let catalog = RsCatalog::new(vec![
            RsInstance {
                name: "home".into(),
                bandwidth: 1e12,
                acquisition_delay: 0.0,
                cost_per_hour: 0.0,
            },
            RsInstance {
                name: "away".into(),
                bandwidth: 16.0,
                acquisition_delay: 0.0,
                cost_per_hour: 0.0,
            },
        ])
        .unwrap();
        let input = SchedulerInput::new(1.0, "home", catalog).unwrap();
        (wf, input, [a, bb, c, d])
    }

    fn schedule_on(wf: &Workflow, rs: RsId) -> Vec<Mapping> {
        wf.task_ids()
            .map(|t| Mapping::new(t, ResourceId(0), rs))
            .collect()
    }

    #[test]
    fn whole_dag_windows() {
        let (wf, input, [a, b, c, d]) = diamond();
        let model = CostModel::new(&wf, &input);
        let schedule = schedule_on(&wf, input.location_rs);
        let cp = CriticalPath::analyze(&model, &schedule, &Partition::whole(&wf)).unwrap();

        // transfers over 1e12 bit/s are negligible but not zero
        assert!(cp.est(a) < 1e-9);
        assert!((cp.est(b) - 2.0).abs() < 1e-6);
        assert!((cp.est(d) - 7.0).abs() < 1e-6);
        assert!((cp.lft(d) - 8.0).abs() < 1e-6);
        assert!((cp.lft(c) - 7.0).abs() < 1e-6);
        assert!((cp.lft(a) - 2.0).abs() < 1e-6);
        // c has 2 s of slack, b none
        assert!((cp.slack(c) - 2.0).abs() < 1e-6);
        assert!(cp.slack(b).abs() < 1e-6);
        assert!((cp.makespan() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn slack_is_never_negative() {
        let (wf, input, [_, b, _, _]) = diamond();
        let model = CostModel::new(&wf, &input);
        let away = input.rs_instances.id_of("away").unwrap();
        let mut schedule = schedule_on(&wf, input.location_rs);
        schedule[b.index()].rs = away;
        let cp = CriticalPath::analyze(&model, &schedule, &Partition::whole(&wf)).unwrap();
        for t in wf.task_ids() {
            assert!(cp.slack(t) >= -1e-9, "negative slack on {t:?}");
        }
    }

    #[test]
    fn cross_instance_hop_delays_successor() {
        let (wf, input, [a, b, _, d]) = diamond();
        let model = CostModel::new(&wf, &input);
        let away = input.rs_instances.id_of("away").unwrap();
        let mut schedule = schedule_on(&wf, input.location_rs);
        schedule[b.index()].rs = away;

        let cp = CriticalPath::analyze(&model, &schedule, &Partition::whole(&wf)).unwrap();
        let base = cp.est(a) + cp.runtime(a);
        // b reads 8 MB from a across instances: 8 / (16 / 8) = 4 s
        assert!(close(cp.est(b), base + 4.0));
        // and d reads b's side across instances again
        assert!(close(cp.est(d), cp.est(b) + cp.runtime(b) + 4.0));
    }

    #[test]
    fn subset_analysis_ignores_outside_tasks() {
        let (wf, input, [a, b, c, d]) = diamond();
        let model = CostModel::new(&wf, &input);
        let schedule = schedule_on(&wf, input.location_rs);
        let part = Partition::of(&wf, [b, d]);
        let cp = CriticalPath::analyze(&model, &schedule, &part).unwrap();

        // b is an entry of the subset, so it starts after its own input only
        assert!(cp.est(b) < 1e-9);
        assert!((cp.est(d) - 5.0).abs() < 1e-6);
        assert_eq!(cp.est(a), 0.0);
        assert_eq!(cp.lft(c), 0.0);
        assert_eq!(cp.members(), &[b, d]);
    }

    #[test]
    fn group_runtime_is_span_of_the_group() {
        let (wf, input, [a, b, c, _]) = diamond();
        let model = CostModel::new(&wf, &input);
        let schedule = schedule_on(&wf, input.location_rs);

        let group = [schedule[a.index()], schedule[b.index()], schedule[c.index()]];
        let span = group_runtime(&model, &schedule, &group, 0.5).unwrap();
        // a (2) then the slower of b (5) / c (3)
        assert!((span - 7.5).abs() < 1e-6);
    }

    #[test]
    fn group_runtime_uses_the_proposed_mappings() {
        let (wf, input, [a, b, _, _]) = diamond();
        let model = CostModel::new(&wf, &input);
        let schedule = schedule_on(&wf, input.location_rs);
        let away = input.rs_instances.id_of("away").unwrap();

        let group = [schedule[a.index()], Mapping::new(b, ResourceId(0), away)];
        let span = group_runtime(&model, &schedule, &group, 0.0).unwrap();
        // a (2), the hop (4), then b at "away" (5 + 4 to stage its input)
        assert!((span - 15.0).abs() < 1e-6);
        // the schedule itself is untouched
        assert_eq!(schedule[b.index()].rs, input.location_rs);
    }
}
