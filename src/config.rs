// src/config.rs

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Candidate env files, checked in order; the first one that exists wins.
/// Mirrors the layout of the dashboard repo this pipeline feeds.
pub static ENV_CANDIDATES: &[&str] = &["web/.env.local", "../web/.env.local", ".env.local"];

const URL_KEYS: &[&str] = &["NEXT_PUBLIC_SUPABASE_URL", "SUPABASE_URL"];
const KEY_KEYS: &[&str] = &["NEXT_PUBLIC_SUPABASE_ANON_KEY", "SUPABASE_KEY"];

/// Datastore credentials. Loaded once at startup and passed into the
/// components that need them; nothing reads the environment ambiently.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_key: String,
}

impl Config {
    /// Resolve credentials from the first existing candidate file.
    /// Missing file or missing keys is fatal: the pipeline refuses to
    /// start without a place to put its output.
    pub fn load() -> Result<Self> {
        for candidate in ENV_CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                info!(path = %path.display(), "loading credentials");
                return Self::load_from(path);
            }
        }
        bail!(
            "no credentials file found; looked for {}",
            ENV_CANDIDATES.join(", ")
        );
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading credentials file {:?}", path))?;
        let vars = parse_env(&content);

        let store_url = first_of(&vars, URL_KEYS)
            .with_context(|| format!("{:?} does not define the datastore URL", path))?;
        let store_key = first_of(&vars, KEY_KEYS)
            .with_context(|| format!("{:?} does not define the datastore key", path))?;

        Ok(Self { store_url, store_key })
    }
}

fn first_of(vars: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| vars.get(*k).cloned())
}

/// Minimal dotenv-style parser: `KEY=VALUE` lines, `#` comments, optional
/// surrounding quotes on the value.
fn parse_env(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
    }
    vars
}

fn unquote(raw: &str) -> &str {
    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}
