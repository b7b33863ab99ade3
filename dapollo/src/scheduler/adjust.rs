/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Proposal adjustment pass.
//!
//! Re-derives `ts`, `ac`, `includes` and `includes_all` of every live proposal
//! from the current schedule.  Each proposal owns a window on the critical
//! path: from the EST of its anchor task to the latest LFT of any task it
//! maps.
//!
//! * Group proposals rebuild `ts`/`ac` from their plain values plus the data
//!   transfers implied by where the anchor's neighbours currently stage data.
//! * A solo proposal `o` whose window overlaps and whose task cannot absorb
//!   its own speed-up in slack is merged into `i`: its cost delta is folded
//!   into `i.ac` and the time its task would otherwise block `i` into `i.ts`.
//! * Every proposal whose window lies inside `i`'s window lands in
//!   `i.includes_all`.
//!
//! Proposals are updated in place and in live-list order, so a later proposal
//! sees the already updated `ts` of an earlier one.

use std::collections::HashMap;

use tracing::trace;

use crate::workflow::{Partition, TaskId};

use super::cost::CostModel;
use super::critical_path::CriticalPath;
use super::error::SchedulerError;
use super::proposal::{Mapping, Proposal, ProposalId};
use super::TOLERANCE;

/// Critical-path window of a proposal.
#[derive(Debug, Clone, Copy)]
struct Window {
    est: f64,
    lft: f64,
}

impl Window {
    fn of(cp: &CriticalPath, proposal: &Proposal) -> Self {
        Self {
            est: cp.est(proposal.anchor().task),
            lft: proposal
                .mappings
                .iter()
                .map(|m| cp.lft(m.task))
                .fold(0.0, f64::max),
        }
    }

    fn overlaps(&self, other: &Window) -> bool {
        self.est < other.lft - TOLERANCE && self.lft - TOLERANCE > other.est
    }

    fn nested(&self, inner: &Window) -> bool {
        self.est <= inner.est && self.lft <= inner.lft
    }
}

/// Run one adjustment pass over `live` proposals of the arena.
pub(super) fn adjust_proposals(
    model: &CostModel<'_>,
    current: &[Mapping],
    proposals: &mut [Proposal],
    live: &[ProposalId],
) -> Result<(), SchedulerError> {
    let wf = model.workflow;
    let cp = CriticalPath::analyze(model, current, &Partition::whole(wf))?;
    let windows: HashMap<ProposalId, Window> = live
        .iter()
        .map(|&id| (id, Window::of(&cp, &proposals[id.0])))
        .collect();

    for &i in live {
        let (ts, mut ac) = own_values(model, &cp, current, &proposals[i.0])?;
        let anchor = *proposals[i.0].anchor();
        let win_i = windows[&i];

        let mut includes = Vec::new();
        let mut includes_all = Vec::new();
        let mut considered: HashMap<TaskId, Mapping> = HashMap::new();
        let mut ts_o = 0.0_f64;

        for &o in live {
            let other = &proposals[o.0];
            let win_o = windows[&o];
            let Mapping {
                task: t_o,
                resource: r_o,
                ..
            } = *other.anchor();

            if o != i && !other.is_group() && current[t_o.index()].resource != r_o {
                let spare = win_o.lft - cp.est(t_o) - cp.runtime(t_o);

                if win_i.overlaps(&win_o) && spare < other.ts {
                    let overlapping = Mapping::new(t_o, r_o, anchor.rs);
                    if t_o != anchor.task {
                        ts_o = ts_o.max(cp.runtime(t_o) - model.runtime(&overlapping)? - spare);
                    }

                    let cur_cost = model.cost(&current[t_o.index()])?;
                    // a second proposal for the same task replaces the first
                    if let Some(prev) = considered.get(&t_o) {
                        ac -= model.cost(prev)? - cur_cost;
                    }
                    ac += model.cost(&overlapping)? - cur_cost;
                    includes.push(o);
                    considered.insert(t_o, overlapping);
                }
            }

            if win_i.nested(&win_o) {
                includes_all.push(o);
            }
        }

        let p = &mut proposals[i.0];
        p.ac = ac;
        p.ts = if p.is_group() { ts + ts_o } else { ts.max(ts_o) };
        p.includes = includes;
        p.includes_all = includes_all;
        p.calculate_tradeoff();

        trace!(
            proposal = i.0,
            task = %wf.task(anchor.task).name,
            ts = p.ts,
            ac = p.ac,
            tradeoff = p.tradeoff,
            includes = p.includes.len(),
            includes_all = p.includes_all.len(),
            "adjusted proposal"
        );
    }

    Ok(())
}

/// `ts`/`ac` of a proposal before merging.
///
/// Solo proposals keep their plain values.  A group proposal pays its RS
/// instance for its plain span plus the slowest inbound and outbound
/// transfer, and when it moves its anchor task it saves the anchor's current
/// runtime minus the new runtime, the transfers and the anchor's slack.
fn own_values(
    model: &CostModel<'_>,
    cp: &CriticalPath,
    current: &[Mapping],
    proposal: &Proposal,
) -> Result<(f64, f64), SchedulerError> {
    let mut ts = proposal.ts_plain;
    let mut ac = proposal.ac_plain;
    if !proposal.is_group() {
        return Ok((ts, ac));
    }

    let wf = model.workflow;
    let anchor = proposal.anchor();
    let t = anchor.task;

    let inbound = wf
        .predecessors(t)
        .iter()
        .filter(|p| current[p.index()].rs != anchor.rs)
        .map(|p| model.transfer_between(wf.task(t).input_mb, current[p.index()].rs, anchor.rs))
        .fold(0.0, f64::max);
    let outbound = wf
        .successors(t)
        .iter()
        .map(|s| model.transfer_between(wf.task(*s).output_mb, current[s.index()].rs, anchor.rs))
        .fold(0.0, f64::max);

    ac = (proposal.ts_plain + inbound + outbound) * model.rs_rate(anchor.rs);

    if current[t.index()].resource != anchor.resource {
        let spare = cp.slack(t);
        ts = cp.runtime(t) - (model.runtime(anchor)? + inbound + outbound) - spare;
    }

    Ok((ts, ac))
}
