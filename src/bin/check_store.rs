//! Inspect the datastore: list dimension rows and per-country fact counts.

use anyhow::{Context, Result};
use atlasgdp::{config::Config, sink::Store};
use reqwest::Client;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    let cfg = Config::load().context("resolving datastore credentials")?;
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("building HTTP client")?;
    let store = Store::new(client, &cfg)?;

    println!("=== countries ===");
    let countries = store.list_countries().await?;
    for c in &countries {
        println!("{:>4}  {}  {}", c.id, c.iso_code, c.name);
    }

    println!("\n=== indicators ===");
    for i in store.list_indicators().await? {
        println!("{:>4}  {}  {}", i.id, i.code, i.label);
    }

    println!("\n=== fact rows per country ===");
    for c in &countries {
        let count = store.count_facts(c.id).await?;
        println!("{} ({}): {} rows", c.name, c.iso_code, count);
    }

    Ok(())
}
