// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use tracing::info;

use dockhand::apply::Applier;
use dockhand::config::Config;
use dockhand::definition::TaskParams;
use dockhand::kubernetes::default_client;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let task_file = std::env::args()
        .nth(1)
        .context("usage: dockhand <task-file>")?;
    let contents = std::fs::read_to_string(&task_file)
        .with_context(|| format!("Failed to read task file {}", task_file))?;
    let params: TaskParams =
        serde_yaml::from_str(&contents).context("Failed to parse task parameters")?;

    let config = Config::from_env()?;
    info!("Loaded task from {}", task_file);

    let client = default_client().await?;
    info!("Connected to Kubernetes cluster");

    let mut applier = Applier::new(client, &config);
    let reports = applier.run_task(&params).await?;

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
