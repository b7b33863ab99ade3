/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! DAG utilities over the task-only workflow graph.
//!
//! Everything here is read-only adjacency information; acyclicity is already
//! guaranteed by [`WorkflowBuilder::build`](super::WorkflowBuilder::build).

use super::{TaskId, Workflow};

impl Workflow {
    /// Immediate predecessors of `task`, sorted by id.
    pub fn predecessors(&self, task: TaskId) -> &[TaskId] {
        self.preds
            .get(task.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Immediate successors of `task`, sorted by id.
    pub fn successors(&self, task: TaskId) -> &[TaskId] {
        self.succs
            .get(task.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `true` if `task` has no predecessor in the whole DAG.
    pub fn is_entry(&self, task: TaskId) -> bool {
        self.predecessors(task).is_empty()
    }

    /// `true` if `task` has no successor in the whole DAG.
    pub fn is_exit(&self, task: TaskId) -> bool {
        self.successors(task).is_empty()
    }

    pub fn entry_tasks(&self) -> Vec<TaskId> {
        self.task_ids().filter(|&t| self.is_entry(t)).collect()
    }

    pub fn exit_tasks(&self) -> Vec<TaskId> {
        self.task_ids().filter(|&t| self.is_exit(t)).collect()
    }

    /// Every task, predecessors before successors.
    pub fn topological_order(&self) -> &[TaskId] {
        &self.order
    }
}

// ── Partition ─────────────────────────────────────────────────────────────────

/// A task subset together with its entry/exit classification *inside* the
/// subset.
///
/// Within a partition a task is an entry when none of its predecessors is a
/// member, and an exit when none of its successors is.  A task with no
/// neighbour in the subset is both.  Critical-path passes only follow edges
/// between members.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Members in topological order.
    members: Vec<TaskId>,
    mask: Vec<bool>,
}

impl Partition {
    /// Partition covering the whole workflow.
    pub fn whole(workflow: &Workflow) -> Self {
        Self {
            members: workflow.topological_order().to_vec(),
            mask: vec![true; workflow.task_count()],
        }
    }

    /// Partition of the given tasks.  Duplicates and foreign ids are ignored.
    pub fn of(workflow: &Workflow, tasks: impl IntoIterator<Item = TaskId>) -> Self {
        let mut mask = vec![false; workflow.task_count()];
        for t in tasks {
            if let Some(slot) = mask.get_mut(t.index()) {
                *slot = true;
            }
        }
        let members = workflow
            .topological_order()
            .iter()
            .copied()
            .filter(|t| mask[t.index()])
            .collect();
        Self { members, mask }
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.mask.get(task.index()).copied().unwrap_or(false)
    }

    /// Members in topological order.
    pub fn members(&self) -> &[TaskId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Predecessors of `task` that are members of this partition.
    pub fn predecessors<'a>(
        &'a self,
        workflow: &'a Workflow,
        task: TaskId,
    ) -> impl Iterator<Item = TaskId> + 'a {
        workflow
            .predecessors(task)
            .iter()
            .copied()
            .filter(move |&p| self.contains(p))
    }

    /// Successors of `task` that are members of this partition.
    pub fn successors<'a>(
        &'a self,
        workflow: &'a Workflow,
        task: TaskId,
    ) -> impl Iterator<Item = TaskId> + 'a {
        workflow
            .successors(task)
            .iter()
            .copied()
            .filter(move |&s| self.contains(s))
    }

    pub fn is_entry(&self, workflow: &Workflow, task: TaskId) -> bool {
        self.predecessors(workflow, task).next().is_none()
    }

    pub fn is_exit(&self, workflow: &Workflow, task: TaskId) -> bool {
        self.successors(workflow, task).next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Resource, WorkflowBuilder};

    /// Diamond: a → {b, c} → d, plus an isolated task e.
    fn diamond() -> (Workflow, [TaskId; 5]) {
        let mut b = WorkflowBuilder::new();
        let r = b
            .add_resource(Resource {
                name: "r".into(),
                bandwidth: 1e9,
                acquisition_delay: 0.0,
                cost_per_hour: 1.0,
            })
            .unwrap();
        let ids: Vec<TaskId> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| {
                let t = b.add_task(*n, 0.0, 0.0).unwrap();
                b.add_candidate(t, r, 1.0).unwrap();
                t
            })
            .collect();
        let [a, bb, c, d, e] = [ids[0], ids[1], ids[2], ids[3], ids[4]];
        b.add_dependency(a, bb).unwrap();
        b.add_dependency(a, c).unwrap();
        b.add_dependency(c, d).unwrap();
        b.add_dependency(bb, d).unwrap();
        (b.build().unwrap(), [a, bb, c, d, e])
    }

    #[test]
    fn classifies_entry_and_exit_tasks() {
        let (wf, [a, b, c, d, e]) = diamond();
        assert_eq!(wf.entry_tasks(), vec![a, e]);
        assert_eq!(wf.exit_tasks(), vec![d, e]);
        assert!(!wf.is_entry(b) && !wf.is_exit(c));
    }

    #[test]
    fn neighbour_lists_are_sorted() {
        let (wf, [a, b, c, d, _]) = diamond();
        assert_eq!(wf.successors(a), &[b, c]);
        assert_eq!(wf.predecessors(d), &[b, c]);
        assert!(wf.predecessors(a).is_empty());
    }

    #[test]
    fn topological_order_respects_edges() {
        let (wf, _) = diamond();
        let order = wf.topological_order();
        assert_eq!(order.len(), 5);
        let pos = |t: TaskId| order.iter().position(|&x| x == t).unwrap();
        for t in wf.task_ids() {
            for &s in wf.successors(t) {
                assert!(pos(t) < pos(s));
            }
        }
    }

    #[test]
    fn partition_reclassifies_within_subset() {
        let (wf, [a, b, c, d, _]) = diamond();
        let part = Partition::of(&wf, [b, d, c]);

        assert_eq!(part.len(), 3);
        assert!(!part.contains(a));
        // b and c lose their predecessor a, so they become entries
        assert!(part.is_entry(&wf, b) && part.is_entry(&wf, c));
        assert!(part.is_exit(&wf, d));
        assert!(!part.is_exit(&wf, b));
        assert_eq!(part.predecessors(&wf, d).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(part.members().last(), Some(&d));
    }

    #[test]
    fn isolated_member_is_entry_and_exit() {
        let (wf, [a, _, _, d, _]) = diamond();
        let part = Partition::of(&wf, [a, d, TaskId::new(99)]);
        assert_eq!(part.len(), 2);
        assert!(part.is_entry(&wf, d) && part.is_exit(&wf, d));
        assert!(part.is_entry(&wf, a) && part.is_exit(&wf, a));
    }

    #[test]
    fn whole_partition_matches_workflow() {
        let (wf, _) = diamond();
        let part = Partition::whole(&wf);
        assert_eq!(part.len(), wf.task_count());
        for t in wf.task_ids() {
            assert_eq!(part.is_entry(&wf, t), wf.is_entry(t));
            assert_eq!(part.is_exit(&wf, t), wf.is_exit(t));
        }
    }
}
