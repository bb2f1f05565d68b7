use anyhow::{Context, Result};
use atlasgdp::{assemble, config::Config, fetch::WorldBank, sink};
use reqwest::Client;
use std::{env, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_ARTIFACT: &str = "AtlasGDP_RawData.csv";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) resolve configuration before any work ────────────────────
    let cfg = Config::load().context("resolving datastore credentials")?;
    let artifact_path: PathBuf = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ARTIFACT.into())
        .into();

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    // ─── 3) fetch + assemble the dataset ─────────────────────────────
    let wb = WorldBank::new(client.clone());
    let dataset = assemble::build_dataset(&wb).await?;
    info!(
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "dataset assembled"
    );

    // ─── 4) write the flat artifact ──────────────────────────────────
    sink::artifact::write_csv(&dataset, &artifact_path)?;

    // ─── 5) upsert dimensions, upload facts ──────────────────────────
    let store = sink::Store::new(client, &cfg)?;
    let country_ids = store.ensure_countries().await?;
    let indicator_ids = store.ensure_indicators().await?;
    let inserted = store.upload(&dataset, &country_ids, &indicator_ids).await?;
    info!(inserted, "upload complete");

    info!("all done");
    Ok(())
}
