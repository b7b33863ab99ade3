/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Mappings and proposals.
//!
//! Proposals live in one arena owned by the scheduler and refer to each other
//! only through [`ProposalId`] indices, so the `includes` / `includes_all`
//! relations may freely contain back-references and cycles.

use std::fmt::Write as _;

use crate::config::{RsId, SchedulerInput};
use crate::workflow::{ResourceId, TaskId, Workflow};

// ── Mapping ───────────────────────────────────────────────────────────────────

/// Binding of one task to a compute resource and an RS instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    pub task: TaskId,
    pub resource: ResourceId,
    pub rs: RsId,

    /// Irrevocably committed.  A finalized mapping is never replaced.
    pub finalized: bool,

    /// Installed as a side effect of applying a proposal.
    pub set_by_other_proposal: bool,
}

impl Mapping {
    pub fn new(task: TaskId, resource: ResourceId, rs: RsId) -> Self {
        Self {
            task,
            resource,
            rs,
            finalized: false,
            set_by_other_proposal: false,
        }
    }

    /// Same task, resource and RS instance; flags are ignored.
    pub fn same_target(&self, other: &Mapping) -> bool {
        self.task == other.task && self.resource == other.resource && self.rs == other.rs
    }
}

/// Render mappings as `<task,resource,rs>` triples for diagnostics.
pub fn mapping_string(workflow: &Workflow, input: &SchedulerInput, mappings: &[Mapping]) -> String {
    let mut out = String::new();
    for m in mappings {
        let _ = write!(
            out,
            "<{},{},{}>",
            workflow.task(m.task).name,
            workflow.resource(m.resource).name,
            input.rs_instances.get(m.rs).name,
        );
    }
    out
}

// ── Proposal ──────────────────────────────────────────────────────────────────

/// Index of a proposal in the scheduler's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProposalId(pub(crate) usize);

impl ProposalId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A candidate change to the current schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Mappings this proposal installs.  The first one is the anchor.
    pub mappings: Vec<Mapping>,

    /// Time saved, including merged overlapping proposals.
    pub ts: f64,

    /// Additional cost, including merged overlapping proposals.
    pub ac: f64,

    /// Own time saved, without merges.
    pub ts_plain: f64,

    /// Own additional cost, without merges.
    pub ac_plain: f64,

    /// Ranking score, see [`calculate_tradeoff`](Self::calculate_tradeoff).
    pub tradeoff: f64,

    /// Solo proposals whose window overlaps this one and whose cost/time were
    /// folded into `ts`/`ac`.
    pub includes: Vec<ProposalId>,

    /// Proposals whose window lies inside this one (this proposal included).
    pub includes_all: Vec<ProposalId>,

    /// Every task this proposal would finalize.
    pub task_includes: Vec<TaskId>,
}

impl Proposal {
    /// Build a proposal; merged values start equal to the plain ones.
    pub fn new(mappings: Vec<Mapping>, ts: f64, ac: f64, task_includes: Vec<TaskId>) -> Self {
        let mut p = Self {
            mappings,
            ts,
            ac,
            ts_plain: ts,
            ac_plain: ac,
            tradeoff: 0.0,
            includes: Vec::new(),
            includes_all: Vec::new(),
            task_includes,
        };
        p.calculate_tradeoff();
        p
    }

    /// The first mapping.
    ///
    /// # Panics
    /// Panics on a proposal without mappings; the scheduler never builds one.
    pub fn anchor(&self) -> &Mapping {
        &self.mappings[0]
    }

    /// `true` if the proposal moves more than one task.
    pub fn is_group(&self) -> bool {
        self.mappings.len() > 1
    }

    /// `true` if any of this proposal's mappings is for `task`.
    pub fn maps(&self, task: TaskId) -> bool {
        self.mappings.iter().any(|m| m.task == task)
    }

    /// `ts / ac`, with `f64::MIN` when nothing is saved and `f64::MAX` when the
    /// proposal is free.  A non-positive `ts` wins over a non-positive `ac`.
    pub fn calculate_tradeoff(&mut self) {
        self.tradeoff = if self.ts <= 0.0 {
            f64::MIN
        } else if self.ac <= 0.0 {
            f64::MAX
        } else {
            self.ts / self.ac
        };
    }
}
