/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! dApollo – cost-bounded online workflow scheduler
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – workflow file loading, RS catalog, scheduler input
//! ├── workflow/       – task/resource model and DAG queries
//! ├── scheduler/      – cost model, critical path, proposals, engine
//! └── handle.rs       – serialised async access to one engine
//! ```

pub mod config;
pub mod handle;
pub mod scheduler;
pub mod workflow;
