// src/sink/store.rs

use anyhow::{anyhow, Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::catalog::{Indicator, COUNTRIES, INDICATORS, INDICATOR_BY_COLUMN};
use crate::config::Config;
use crate::table::WideTable;

/// Fact rows per insert request.
pub const INSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CountryRow {
    pub id: i64,
    pub name: String,
    pub iso_code: String,
}

#[derive(Debug, Deserialize)]
pub struct IndicatorRow {
    pub id: i64,
    pub code: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
struct NewCountry<'a> {
    name: &'a str,
    iso_code: &'a str,
}

#[derive(Debug, Serialize)]
struct NewIndicator<'a> {
    code: &'a str,
    label: &'a str,
    unit: &'a str,
}

/// One observation in the `time_series` fact table, keyed by surrogate
/// dimension ids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactRow {
    pub country_id: i64,
    pub indicator_id: i64,
    pub year: i32,
    pub value: f64,
}

/// PostgREST client for the three-table datastore schema:
/// `countries`, `indicators`, `time_series`.
pub struct Store {
    client: Client,
    base: Url,
    key: String,
}

impl Store {
    pub fn new(client: Client, cfg: &Config) -> Result<Self> {
        let mut base = Url::parse(&cfg.store_url).context("datastore URL is not valid")?;
        // join() needs the trailing slash to keep the full path.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base, key: cfg.store_key.clone() })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.base
            .join(&format!("rest/v1/{table}"))
            .with_context(|| format!("building URL for table {table}"))
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.key)
            .header(AUTHORIZATION, format!("Bearer {}", self.key))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, columns: &str) -> Result<Vec<T>> {
        let url = self.table_url(table)?;
        let rows = self
            .auth(self.client.get(url))
            .query(&[("select", columns)])
            .send()
            .await
            .with_context(|| format!("selecting from {table}"))?
            .error_for_status()
            .with_context(|| format!("bad status selecting from {table}"))?
            .json()
            .await
            .with_context(|| format!("decoding rows from {table}"))?;
        Ok(rows)
    }

    /// Insert rows and return the created representations (used for
    /// dimension rows, where we need the generated ids back).
    async fn insert_returning<T, R>(&self, table: &str, rows: &[T]) -> Result<Vec<R>>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.table_url(table)?;
        let created = self
            .auth(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await
            .with_context(|| format!("inserting into {table}"))?
            .error_for_status()
            .with_context(|| format!("bad status inserting into {table}"))?
            .json()
            .await
            .with_context(|| format!("decoding created rows from {table}"))?;
        Ok(created)
    }

    async fn insert_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        let url = self.table_url(table)?;
        self.auth(self.client.post(url))
            .json(rows)
            .send()
            .await
            .with_context(|| format!("inserting into {table}"))?
            .error_for_status()
            .with_context(|| format!("bad status inserting into {table}"))?;
        Ok(())
    }

    pub async fn list_countries(&self) -> Result<Vec<CountryRow>> {
        self.select("countries", "id,name,iso_code").await
    }

    pub async fn list_indicators(&self) -> Result<Vec<IndicatorRow>> {
        self.select("indicators", "id,code,label").await
    }

    /// Idempotent dimension upsert: rows already present (by iso_code)
    /// are left alone, missing ones are inserted. Returns iso_code → id.
    pub async fn ensure_countries(&self) -> Result<HashMap<String, i64>> {
        let mut ids: HashMap<String, i64> = self
            .list_countries()
            .await?
            .into_iter()
            .map(|row| (row.iso_code, row.id))
            .collect();

        for country in COUNTRIES {
            if ids.contains_key(country.iso3) {
                debug!(iso3 = %country.iso3, "country already present");
                continue;
            }
            let created: Vec<CountryRow> = self
                .insert_returning(
                    "countries",
                    &[NewCountry { name: country.name, iso_code: country.iso3 }],
                )
                .await
                .with_context(|| format!("creating country {}", country.iso3))?;
            for row in created {
                info!(iso3 = %row.iso_code, id = row.id, "created country");
                ids.insert(row.iso_code, row.id);
            }
        }

        Ok(ids)
    }

    /// Same as [`ensure_countries`](Self::ensure_countries), keyed by
    /// indicator store code. Returns code → id.
    pub async fn ensure_indicators(&self) -> Result<HashMap<String, i64>> {
        let mut ids: HashMap<String, i64> = self
            .list_indicators()
            .await?
            .into_iter()
            .map(|row| (row.code, row.id))
            .collect();

        for indicator in unique_indicators() {
            if ids.contains_key(indicator.store_code) {
                debug!(code = %indicator.store_code, "indicator already present");
                continue;
            }
            let created: Vec<IndicatorRow> = self
                .insert_returning(
                    "indicators",
                    &[NewIndicator {
                        code: indicator.store_code,
                        label: indicator.label,
                        unit: indicator.unit,
                    }],
                )
                .await
                .with_context(|| format!("creating indicator {}", indicator.store_code))?;
            for row in created {
                info!(code = %row.code, id = row.id, "created indicator");
                ids.insert(row.code, row.id);
            }
        }

        Ok(ids)
    }

    /// Upload the table's catalog-mapped observations in batches. A
    /// failed batch is logged and skipped; the rest of the upload
    /// proceeds. Returns the number of rows actually inserted.
    pub async fn upload(
        &self,
        table: &WideTable,
        country_ids: &HashMap<String, i64>,
        indicator_ids: &HashMap<String, i64>,
    ) -> Result<usize> {
        let rows = fact_rows(table, country_ids, indicator_ids);
        info!(total = rows.len(), "uploading fact rows");

        let mut inserted = 0usize;
        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            match self.insert_rows("time_series", batch).await {
                Ok(()) => {
                    inserted += batch.len();
                    info!(batch = batch.len(), inserted, "batch inserted");
                }
                Err(err) => {
                    error!("batch insert failed: {err:#}");
                }
            }
        }

        Ok(inserted)
    }

    /// Exact fact-row count for one country, via a zero-row ranged
    /// request and the Content-Range total.
    pub async fn count_facts(&self, country_id: i64) -> Result<u64> {
        let url = self.table_url("time_series")?;
        let filter = format!("eq.{country_id}");
        let resp = self
            .auth(self.client.get(url))
            .query(&[("select", "country_id"), ("country_id", filter.as_str())])
            .header("Prefer", "count=exact")
            .header(RANGE, "0-0")
            .send()
            .await
            .context("counting fact rows")?
            .error_for_status()
            .context("bad status counting fact rows")?;

        let content_range = resp
            .headers()
            .get(CONTENT_RANGE)
            .ok_or_else(|| anyhow!("response has no Content-Range header"))?
            .to_str()
            .context("Content-Range is not ASCII")?;
        parse_range_total(content_range)
    }
}

/// Catalog indicators deduplicated by store code, first-listed wins.
fn unique_indicators() -> Vec<&'static Indicator> {
    let mut seen = HashSet::new();
    INDICATORS
        .iter()
        .filter(|ind| seen.insert(ind.store_code))
        .collect()
}

/// Translate the wide table into fact rows. Only columns present in the
/// indicator catalog are uploaded (derived and lag columns are
/// artifact-only); null and non-finite values are skipped, as are rows
/// for countries missing from the dimension map.
pub fn fact_rows(
    table: &WideTable,
    country_ids: &HashMap<String, i64>,
    indicator_ids: &HashMap<String, i64>,
) -> Vec<FactRow> {
    let mut rows = Vec::new();
    let mut unmapped: HashSet<&str> = HashSet::new();

    for ((iso3, year), values) in table.iter_rows() {
        let Some(&country_id) = country_ids.get(iso3) else {
            if unmapped.insert(iso3.as_str()) {
                warn!(country = %iso3, "country missing from dimension table; skipping");
            }
            continue;
        };

        for column in table.columns() {
            let Some(indicator) = INDICATOR_BY_COLUMN.get(column.as_str()) else {
                continue;
            };
            let Some(&indicator_id) = indicator_ids.get(indicator.store_code) else {
                continue;
            };
            let Some(&value) = values.get(column) else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }
            rows.push(FactRow { country_id, indicator_id, year: *year, value });
        }
    }

    rows
}

fn parse_range_total(content_range: &str) -> Result<u64> {
    let total = content_range
        .rsplit('/')
        .next()
        .ok_or_else(|| anyhow!("malformed Content-Range {content_range:?}"))?;
    total
        .parse()
        .with_context(|| format!("malformed Content-Range total {content_range:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Point;

    fn sample_table() -> WideTable {
        let mut t = WideTable::new();
        t.merge_series(
            "USA",
            "gdp_usd",
            &[
                Point { year: 2020, value: Some(21.4) },
                Point { year: 2021, value: None },
            ],
        );
        t.merge_series("USA", "exports_pct_gdp", &[Point { year: 2020, value: Some(10.0) }]);
        t
    }

    fn dims() -> (HashMap<String, i64>, HashMap<String, i64>) {
        let countries = HashMap::from([("USA".to_string(), 1)]);
        let indicators =
            HashMap::from([("gdp".to_string(), 7), ("exports_pct_gdp".to_string(), 9)]);
        (countries, indicators)
    }

    #[test]
    fn fact_rows_skip_nulls() {
        let (countries, indicators) = dims();
        let rows = fact_rows(&sample_table(), &countries, &indicators);

        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&FactRow { country_id: 1, indicator_id: 7, year: 2020, value: 21.4 }));
        assert!(rows.contains(&FactRow { country_id: 1, indicator_id: 9, year: 2020, value: 10.0 }));
        // The null 2021 gdp cell produced nothing.
        assert!(!rows.iter().any(|r| r.year == 2021));
    }

    #[test]
    fn unmapped_columns_and_countries_are_skipped() {
        let mut table = sample_table();
        // Derived column: not in the catalog, never uploaded.
        table.map_column("gdp_usd", "gdp_usd_log", |v| Some(v.ln()));
        table.merge_series("XXX", "gdp_usd", &[Point { year: 2020, value: Some(1.0) }]);

        let (countries, indicators) = dims();
        let rows = fact_rows(&table, &countries, &indicators);

        assert!(rows.iter().all(|r| r.country_id == 1));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let mut table = WideTable::new();
        table.merge_series("USA", "gdp_usd", &[Point { year: 2020, value: Some(f64::NAN) }]);
        let (countries, indicators) = dims();
        assert!(fact_rows(&table, &countries, &indicators).is_empty());
    }

    #[test]
    fn store_codes_dedupe_first_listed_wins() {
        let unique = unique_indicators();
        let mut seen = HashSet::new();
        for ind in &unique {
            assert!(seen.insert(ind.store_code));
        }
        // Order preserved relative to the catalog.
        let catalog_positions: Vec<usize> = unique
            .iter()
            .map(|u| INDICATORS.iter().position(|i| i.column == u.column).unwrap())
            .collect();
        let mut sorted = catalog_positions.clone();
        sorted.sort_unstable();
        assert_eq!(catalog_positions, sorted);
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_range_total("0-0/1234").unwrap(), 1234);
        assert_eq!(parse_range_total("*/0").unwrap(), 0);
        assert!(parse_range_total("garbage").is_err());
    }
}
