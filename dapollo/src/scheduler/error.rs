/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the dApollo scheduler.
//!
//! Only invariant violations are errors.  Business-level outcomes (a task for
//! which no proposal fits the budget, a task that was already finalized) are
//! reported through [`ScheduleReport`](super::ScheduleReport) and the logs,
//! never through this type.

use thiserror::Error;

/// Error returned by [`DApolloScheduler`](super::DApolloScheduler)
/// construction and by [`schedule()`](super::DApolloScheduler::schedule).
///
/// Either variant means the caller handed in an inconsistent workflow or task
/// id.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// The task id does not belong to the scheduled workflow.
    #[error("unknown task #{0}")]
    UnknownTask(usize),

    /// A mapping names a (task, resource) pairing the workflow never declared.
    #[error("task '{task}' has no declared runtime on resource '{resource}'")]
    MissingRuntime { task: String, resource: String },
}
