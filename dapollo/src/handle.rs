/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Serialised async access to one [`DApolloScheduler`].
//!
//! The engine is synchronous and assumes a single writer.  `SharedScheduler`
//! is a cheap cloneable handle that takes an async mutex around every call,
//! so enactment drivers running on several tokio tasks can report ready
//! tasks concurrently without interleaving two `schedule` calls.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::scheduler::{DApolloScheduler, ScheduleReport, SchedulerError, Statistics};
use crate::workflow::TaskId;

#[derive(Debug, Clone)]
pub struct SharedScheduler {
    inner: Arc<Mutex<DApolloScheduler>>,
}

impl SharedScheduler {
    pub fn new(engine: DApolloScheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// See [`DApolloScheduler::schedule`].
    pub async fn schedule(&self, task: TaskId) -> Result<ScheduleReport, SchedulerError> {
        let mut engine = self.inner.lock().await;
        debug!(task = task.index(), "Engine lock acquired");
        engine.schedule(task)
    }

    pub async fn statistics(&self) -> Result<Statistics, SchedulerError> {
        self.inner.lock().await.statistics()
    }

    /// Run a read-only closure against the engine while holding the lock.
    pub async fn inspect<R>(&self, f: impl FnOnce(&DApolloScheduler) -> R) -> R {
        let engine = self.inner.lock().await;
        f(&engine)
    }
}
