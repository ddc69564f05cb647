//! Sitios ETL - batch pipeline for datos.gob.ar cultural datasets.
//!
//! Downloads the configured source tables, snapshots them, normalizes them
//! onto the canonical schema, and persists the combined table plus its
//! summary aggregations.

mod config;
mod data;
mod logging;
mod sink;
mod stats;

use anyhow::Context;
use tracing::error;

use config::PipelineConfig;
use data::{concat, normalize, CkanClient, SnapshotStore};
use sink::{CsvSink, TableSink};
use stats::{cines, totales};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _guard = logging::init_logging();

    if let Err(err) = run() {
        error!(error = %err, "pipeline run failed");
        return Err(err);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let client = CkanClient::new(config.api_url.clone(), config.query_string.clone());
    let store = SnapshotStore::new(&config.snapshot_root);
    let sink = CsvSink::new(&config.output_dir);

    let mut normalized = Vec::with_capacity(config.datasets.len());
    for descriptor in &config.datasets {
        let raw = client
            .fetch(descriptor)
            .with_context(|| format!("downloading '{}'", descriptor.name))?;
        store
            .write(&raw, descriptor)
            .with_context(|| format!("writing snapshot for '{}'", descriptor.name))?;
        let table = normalize(&raw, descriptor, true)
            .with_context(|| format!("normalizing '{}'", descriptor.name))?;
        normalized.push(table);
    }

    let sitios = concat(&normalized).context("combining normalized datasets")?;
    sink.persist(&sitios, "sitios").context("persisting sitios")?;

    let summary = totales(&sitios).context("aggregating totales")?;
    sink.persist(&summary, "totales").context("persisting totales")?;

    let latest = store
        .latest("salas_de_cine")
        .context("loading latest salas_de_cine snapshot")?;
    let screens = cines(&latest).context("aggregating cines")?;
    sink.persist(&screens, "cines").context("persisting cines")?;

    Ok(())
}
