/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Runtime and monetary cost of mappings.
//!
//! Every function here is pure: it reads the immutable [`Workflow`] and
//! [`SchedulerInput`] and never the schedule state.  Data sizes are in MB and
//! bandwidths in bits per second; dividing a bandwidth by 8 turns it into the
//! transfer rate used for the size.
//!
//! ```text
//! runtime(m) = acquisition_delay + declared_runtime + transfer_time(m)
//! cost(m)    = (runtime(m) - acquisition_delay) × cost_per_hour / 3600
//!            | declared_runtime × cost_per_hour / 3600     (transfer cost excluded)
//! ```

use crate::config::{RsId, SchedulerInput};
use crate::workflow::{ResourceId, TaskId, Workflow};

use super::error::SchedulerError;
use super::proposal::Mapping;

/// Seconds per hour; hourly prices are billed per second.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Bits per byte.
const BITS_PER_BYTE: f64 = 8.0;

/// Cost and runtime functions bound to one workflow and run configuration.
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    pub workflow: &'a Workflow,
    pub input: &'a SchedulerInput,
}

impl<'a> CostModel<'a> {
    pub fn new(workflow: &'a Workflow, input: &'a SchedulerInput) -> Self {
        Self { workflow, input }
    }

    /// Declared runtime of `task` on `resource`.
    ///
    /// # Errors
    /// [`SchedulerError::MissingRuntime`] if the pairing was never declared.
    pub fn declared_runtime(&self, task: TaskId, resource: ResourceId) -> Result<f64, SchedulerError> {
        let t = self.workflow.task(task);
        t.declared_runtime(resource)
            .ok_or_else(|| SchedulerError::MissingRuntime {
                task: t.name.clone(),
                resource: self
                    .workflow
                    .resources()
                    .get(resource.0)
                    .map(|r| r.name.clone())
                    .unwrap_or_else(|| format!("#{}", resource.0)),
            })
    }

    /// Time to move the task's input and/or output between its resource and
    /// its RS instance.
    pub fn transfer_time(&self, mapping: &Mapping, input: bool, output: bool) -> f64 {
        let task = self.workflow.task(mapping.task);
        let data = if input { task.input_mb } else { 0.0 } + if output { task.output_mb } else { 0.0 };
        let bandwidth = self
            .workflow
            .resource(mapping.resource)
            .bandwidth
            .min(self.input.rs_instances.get(mapping.rs).bandwidth);
        data / (bandwidth / BITS_PER_BYTE)
    }

    /// Time to move `data_mb` between two RS instances.
    pub fn transfer_between(&self, data_mb: f64, from: RsId, to: RsId) -> f64 {
        let rs = &self.input.rs_instances;
        let bandwidth = rs.get(from).bandwidth.min(rs.get(to).bandwidth);
        data_mb / (bandwidth / BITS_PER_BYTE)
    }

    /// Wall-clock runtime of a single mapping.
    pub fn runtime(&self, mapping: &Mapping) -> Result<f64, SchedulerError> {
        let declared = self.declared_runtime(mapping.task, mapping.resource)?;
        let delay = self.workflow.resource(mapping.resource).acquisition_delay;
        Ok(delay + declared + self.transfer_time(mapping, true, true))
    }

    /// Billed cost of a single mapping.
    pub fn cost(&self, mapping: &Mapping) -> Result<f64, SchedulerError> {
        let declared = self.declared_runtime(mapping.task, mapping.resource)?;
        let resource = self.workflow.resource(mapping.resource);
        let rate = resource.cost_per_hour / SECONDS_PER_HOUR;
        if self.input.exclude_data_transfer_cost {
            Ok(declared * rate)
        } else {
            Ok((self.runtime(mapping)? - resource.acquisition_delay) * rate)
        }
    }

    /// Cost of a mapping set: the sum of its parts plus `epsilon`.
    pub fn group_cost(&self, mappings: &[Mapping], epsilon: f64) -> Result<f64, SchedulerError> {
        let mut sum = 0.0;
        for m in mappings {
            sum += self.cost(m)?;
        }
        Ok(sum + epsilon)
    }

    /// Per-second price of an RS instance.
    pub fn rs_rate(&self, rs: RsId) -> f64 {
        self.input.rs_instances.get(rs).cost_per_hour / SECONDS_PER_HOUR
    }

    /// Per-second price of the primary RS instance.
    pub fn location_rate(&self) -> f64 {
        self.rs_rate(self.input.location_rs)
    }

    /// Cheapest declared resource of `task` when staging through `rs`.
    /// Equal costs go to the faster runtime, then to declaration order.
    pub fn cheapest_resource(&self, task: TaskId, rs: RsId) -> Result<ResourceId, SchedulerError> {
        let mut best: Option<(ResourceId, f64, f64)> = None;
        for candidate in &self.workflow.task(task).candidates {
            let m = Mapping::new(task, candidate.resource, rs);
            let cost = self.cost(&m)?;
            let runtime = self.runtime(&m)?;
            let better = match best {
                None => true,
                Some((_, c, r)) => cost < c || (cost == c && runtime < r),
            };
            if better {
                best = Some((candidate.resource, cost, runtime));
            }
        }
        best.map(|(r, _, _)| r).ok_or_else(|| SchedulerError::MissingRuntime {
            task: self.workflow.task(task).name.clone(),
            resource: "<any>".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RsCatalog, RsInstance};
    use crate::workflow::{Resource, WorkflowBuilder};

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    /// One task `t` (in 2 MB, out 6 MB) with three candidates, two RS instances.
    fn fixture() -> (Workflow, SchedulerInput, TaskId, [ResourceId; 3]) {
        let mut b = WorkflowBuilder::new();
        let mk = |name: &str, bw: f64, delay: f64, price: f64| Resource {
            name: name.into(),
            bandwidth: bw,
            acquisition_delay: delay,
            cost_per_hour: price,
        };
        // bandwidth 64 bit/s = 8 MB-units/s
        let a = b.add_resource(mk("a", 64.0, 2.0, 3600.0)).unwrap();
        let tie = b.add_resource(mk("tie", 64.0, 0.0, 1800.0)).unwrap();
        let c = b.add_resource(mk("c", 64.0, 0.0, 7200.0)).unwrap();
        let t = b.add_task("t", 2.0, 6.0).unwrap();
        b.add_candidate(t, a, 10.0).unwrap();
        b.add_candidate(t, tie, 19.0).unwrap();
        b.add_candidate(t, c, 4.0).unwrap();
        let wf = b.build().unwrap();

        let catalog = RsCatalog::new(vec![
            RsInstance {
                name: "near".into(),
                bandwidth: 640.0,
                acquisition_delay: 0.0,
                cost_per_hour: 36.0,
            },
            RsInstance {
                name: "far".into(),
                bandwidth: 16.0,
                acquisition_delay: 0.0,
                cost_per_hour: 0.0,
            },
        ])
        .unwrap();
        let input = SchedulerInput::new(100.0, "near", catalog).unwrap();
        (wf, input, t, [a, tie, c])
    }

    #[test]
    fn runtime_adds_delay_declared_and_transfer() {
        let (wf, input, t, [a, _, _]) = fixture();
        let model = CostModel::new(&wf, &input);
        let m = Mapping::new(t, a, input.location_rs);
        // 8 MB over min(64, 640)/8 = 8 → 1 s
        assert!(close(model.transfer_time(&m, true, true), 1.0));
        assert!(close(model.transfer_time(&m, true, false), 0.25));
        assert!(close(model.runtime(&m).unwrap(), 2.0 + 10.0 + 1.0));
    }

    #[test]
    fn slower_rs_instance_limits_transfer() {
        let (wf, input, t, [a, _, _]) = fixture();
        let model = CostModel::new(&wf, &input);
        let far = input.rs_instances.id_of("far").unwrap();
        // min(64, 16)/8 = 2 → 8 MB in 4 s
        assert!(close(model.transfer_time(&Mapping::new(t, a, far), true, true), 4.0));
        assert!(close(model.transfer_between(2.0, far, input.location_rs), 1.0));
    }

    #[test]
    fn cost_bills_runtime_without_acquisition_delay() {
        let (wf, input, t, [a, _, _]) = fixture();
        let m = Mapping::new(t, a, input.location_rs);

        let model = CostModel::new(&wf, &input);
        assert!(close(model.cost(&m).unwrap(), 11.0));

        let excluded = input.clone().with_exclude_data_transfer_cost(true);
        let model = CostModel::new(&wf, &excluded);
        assert!(close(model.cost(&m).unwrap(), 10.0));
    }

    #[test]
    fn group_cost_is_additive_plus_epsilon() {
        let (wf, input, t, [a, tie, _]) = fixture();
        let model = CostModel::new(&wf, &input);
        let ms = [
            Mapping::new(t, a, input.location_rs),
            Mapping::new(t, tie, input.location_rs),
        ];
        // 11 + 20 × 0.5 + 0.25
        assert!(close(model.group_cost(&ms, 0.25).unwrap(), 21.25));
        assert!(close(model.rs_rate(input.location_rs), 0.01));
        assert!(close(model.location_rate(), 0.01));
    }

    #[test]
    fn cheapest_resource_breaks_ties_by_runtime() {
        let (wf, input, t, [a, tie, c]) = fixture();
        let model = CostModel::new(&wf, &input);
        // a: 11 × 1 = 11 (runtime 13), tie: 20 × 0.5 = 10 (runtime 20),
        // c: 5 × 2 = 10 (runtime 5) → c wins the tie on runtime.
        assert_eq!(model.cheapest_resource(t, input.location_rs).unwrap(), c);
        assert_ne!(model.cheapest_resource(t, input.location_rs).unwrap(), tie);
        assert_ne!(model.cheapest_resource(t, input.location_rs).unwrap(), a);
    }

    #[test]
    fn undeclared_pairing_is_an_error() {
        let (wf, input, t, _) = fixture();
        let model = CostModel::new(&wf, &input);
        let err = model
            .runtime(&Mapping::new(t, ResourceId(9), input.location_rs))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::MissingRuntime {
                task: "t".into(),
                resource: "#9".into()
            }
        );
    }
}
