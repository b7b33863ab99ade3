/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cost-limit feasibility estimate.
//!
//! # Status: advisory
//!
//! The estimate is **computed and logged** once the initial proposals are
//! adjusted.  It never blocks construction: an engine whose budget is below
//! the estimate still schedules, it simply finds fewer admissible proposals.
//!
//! # Estimate
//! Each task contributes the cheaper of its seeded cost and its seeded cost
//! plus the smallest `ac` of any proposal anchored on it.  The primary RS
//! instance's overhead for the seeded span is added once:
//!
//! ```text
//! cheapest = Σ_t min(cost(t), cost(t) + min_ac(t)) + overhead
//! ```

use crate::workflow::Workflow;

use super::cost::CostModel;
use super::error::SchedulerError;
use super::proposal::{Mapping, Proposal, ProposalId};

// ── Public API ────────────────────────────────────────────────────────────────

/// Lower-bound style estimate of the cheapest reachable schedule cost.
pub fn cheapest_schedule_cost(
    model: &CostModel<'_>,
    current: &[Mapping],
    proposals: &[Proposal],
    live: &[ProposalId],
    overhead: f64,
) -> Result<f64, SchedulerError> {
    let wf: &Workflow = model.workflow;
    let mut min_ac = vec![f64::MAX; wf.task_count()];
    for id in live {
        let p = &proposals[id.0];
        let slot = &mut min_ac[p.anchor().task.index()];
        *slot = slot.min(p.ac);
    }

    let mut total = 0.0;
    for t in wf.task_ids() {
        let cost = model.cost(&current[t.index()])?;
        total += cost.min(cost + min_ac[t.index()]);
    }
    Ok(total + overhead)
}

/// Compare the estimate with the budget.
///
/// Returns `None` if `cheapest ≤ cost_limit`, otherwise `Some(cheapest)`; the
/// caller logs it and carries on.
pub fn check_cost_limit(cheapest: f64, cost_limit: f64) -> Option<f64> {
    if cheapest > cost_limit {
        Some(cheapest)
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing::{chain, close, FAST_CHEAP_RATE};

    #[test]
    fn budget_above_estimate_passes() {
        assert_eq!(check_cost_limit(30.0, 31.0), None);
    }

    #[test]
    fn budget_equal_to_estimate_passes() {
        assert_eq!(check_cost_limit(30.0, 30.0), None);
    }

    #[test]
    fn budget_below_estimate_is_flagged() {
        assert_eq!(check_cost_limit(30.0, 29.0), Some(30.0));
    }

    #[test]
    fn positive_ac_never_lowers_the_estimate() {
        let fx = chain(FAST_CHEAP_RATE, 31.0);
        let model = CostModel::new(&fx.workflow, &fx.input);
        let rs = fx.input.location_rs;
        let current: Vec<Mapping> = fx
            .tasks
            .iter()
            .map(|&t| Mapping::new(t, fx.slow, rs))
            .collect();
        let [a, b, _] = fx.tasks;
        let proposals = vec![
            Proposal::new(vec![Mapping::new(a, fx.fast, rs)], 1.0, 13.625, vec![a]),
            Proposal::new(vec![Mapping::new(b, fx.fast, rs)], 6.0, 0.5, vec![b]),
        ];
        let live = vec![ProposalId(0), ProposalId(1)];

        let est = cheapest_schedule_cost(&model, &current, &proposals, &live, 0.0).unwrap();
        assert!(close(est, 30.0));
        let est = cheapest_schedule_cost(&model, &current, &proposals, &live, 2.5).unwrap();
        assert!(close(est, 32.5));
    }

    #[test]
    fn cost_saving_proposal_lowers_the_estimate() {
        let fx = chain(FAST_CHEAP_RATE, 31.0);
        let model = CostModel::new(&fx.workflow, &fx.input);
        let rs = fx.input.location_rs;
        let current: Vec<Mapping> = fx
            .tasks
            .iter()
            .map(|&t| Mapping::new(t, fx.slow, rs))
            .collect();
        let [_, _, c] = fx.tasks;
        let proposals = vec![
            Proposal::new(vec![Mapping::new(c, fx.fast, rs)], 1.0, -4.0, vec![c]),
            Proposal::new(vec![Mapping::new(c, fx.fast, rs)], 1.0, -1.0, vec![c]),
        ];
        let live = vec![ProposalId(0), ProposalId(1)];

        let est = cheapest_schedule_cost(&model, &current, &proposals, &live, 0.0).unwrap();
        assert!(close(est, 26.0));

        // proposals outside the live list are ignored
        let est = cheapest_schedule_cost(&model, &current, &proposals, &live[1..], 0.0).unwrap();
        assert!(close(est, 29.0));
    }
}
