/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use dapollo::config;
use dapollo::handle::SharedScheduler;
use dapollo::scheduler::DApolloScheduler;
use dapollo::workflow::TaskId;

// ── CLI argument definition ───────────────────────────────────────────────────

/// dApollo cost-bounded workflow scheduler.
///
/// Example:
///   dapollo --workflow demos/chain.yaml --cost-limit 31 --task b
#[derive(Debug, Parser)]
#[command(
    name = "dapollo",
    about = "dApollo cost-bounded online workflow scheduler",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML (or JSON) workflow description.
    #[arg(short = 'w', long = "workflow")]
    workflow: PathBuf,

    /// Override the budget from the workflow file.
    #[arg(short = 'c', long = "cost-limit")]
    cost_limit: Option<f64>,

    /// Bill declared runtimes only, without data-transfer time.
    #[arg(short = 'x', long = "exclude-transfer-cost", default_value_t = false)]
    exclude_transfer_cost: bool,

    /// Task to report ready, in order.  Repeatable.  Defaults to every task in
    /// topological order.
    #[arg(short = 't', long = "task")]
    tasks: Vec<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        workflow = %cli.workflow.display(),
        cost_limit = ?cli.cost_limit,
        exclude_transfer_cost = cli.exclude_transfer_cost,
        tasks = ?cli.tasks,
        "Configuration"
    );

    if let Err(e) = run(cli).await {
        error!("dApollo failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Load workflow and input ───────────────────────────────────────────────
    let cfg = config::load_from_file(&cli.workflow)?;
    let mut input = cfg.input;
    if let Some(limit) = cli.cost_limit {
        input = input.with_cost_limit(limit);
    }
    if cli.exclude_transfer_cost {
        input = input.with_exclude_data_transfer_cost(true);
    }
    let workflow = Arc::new(cfg.workflow);

    let order: Vec<TaskId> = if cli.tasks.is_empty() {
        workflow.topological_order().to_vec()
    } else {
        cli.tasks
            .iter()
            .map(|name| {
                workflow
                    .task_id(name)
                    .with_context(|| format!("unknown task '{name}'"))
            })
            .collect::<Result<_>>()?
    };

    // ── Schedule ──────────────────────────────────────────────────────────────
    let engine = DApolloScheduler::new(Arc::clone(&workflow), Arc::new(input))?;
    let handle = SharedScheduler::new(engine);

    for task in order {
        let report = handle.schedule(task).await?;
        if let Some(stopped) = report.stopped_at {
            info!(task = %workflow.task(stopped).name, "Task was already scheduled");
        }
    }

    // ── Report ────────────────────────────────────────────────────────────────
    handle
        .inspect(|engine| {
            for m in engine.mappings() {
                info!(
                    mapping = %engine.mapping_string(&[*m]),
                    finalized = m.finalized,
                    "Final mapping"
                );
            }
        })
        .await;
    let stats = handle.statistics().await?;
    println!("cost={:.6} makespan={:.6}", stats.cost, stats.makespan);

    Ok(())
}
