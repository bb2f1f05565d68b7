// src/assemble/mod.rs

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::{self, Country, FINAL_COLUMNS, FIRST_YEAR, INDICATORS, LAG_BASES};
use crate::fetch::WorldBank;
use crate::table::WideTable;

/// Countries fetched in flight at once. Indicators within a country are
/// fetched sequentially, in catalog order.
const FETCH_CONCURRENCY: usize = 4;

/// Fetch every catalog indicator for one country and outer-join the
/// non-empty series into a single wide table.
///
/// A failed or empty indicator is logged and skipped; its column simply
/// never appears. An entirely empty result is not an error; the caller
/// drops the country.
pub async fn merge_country(wb: &WorldBank, country: &Country) -> WideTable {
    let mut table = WideTable::new();

    for indicator in INDICATORS {
        match wb.fetch_series(country.iso3, indicator.wb_code).await {
            Ok(points) if points.is_empty() => {
                debug!(country = %country.iso3, column = %indicator.column, "no observations");
            }
            Ok(points) => {
                debug!(
                    country = %country.iso3,
                    column = %indicator.column,
                    n = points.len(),
                    "merged series"
                );
                table.merge_series(country.iso3, indicator.column, &points);
            }
            Err(err) => {
                warn!(
                    country = %country.iso3,
                    column = %indicator.column,
                    code = %indicator.wb_code,
                    "fetch failed: {err:#}"
                );
            }
        }
    }

    table
}

/// Fetch and merge all catalog countries, then finalize the dataset.
/// Fatal only when no country yields any data at all.
pub async fn build_dataset(wb: &WorldBank) -> Result<WideTable> {
    let sem = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
    let mut handles = Vec::with_capacity(catalog::COUNTRIES.len());

    for country in catalog::COUNTRIES {
        let wb = wb.clone();
        let sem = Arc::clone(&sem);
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore never closes");
            info!(country = %country.name, iso3 = %country.iso3, "fetching indicators");
            merge_country(&wb, country).await
        }));
    }

    let mut tables = Vec::with_capacity(handles.len());
    for (country, handle) in catalog::COUNTRIES.iter().zip(handles) {
        let table = handle.await?;
        if table.is_empty() {
            warn!(country = %country.iso3, "no data collected");
        } else {
            info!(country = %country.iso3, rows = table.len(), "country merged");
        }
        tables.push(table);
    }

    let dataset = stack_tables(tables)?;
    Ok(finalize_dataset(dataset))
}

/// Stack per-country tables into one. Empty tables are dropped; all of
/// them being empty signals a systemic upstream problem and is fatal.
fn stack_tables(tables: Vec<WideTable>) -> Result<WideTable> {
    let mut dataset = WideTable::new();
    for table in tables {
        if !table.is_empty() {
            dataset.concat(table);
        }
    }
    if dataset.is_empty() {
        bail!("no data collected for any country");
    }
    Ok(dataset)
}

/// Year filter, derived columns, lag columns, canonical column order.
///
/// Derived and lag columns are always part of the schema, null-filled
/// when their inputs are missing; raw indicator columns exist only if
/// their fetch succeeded.
pub fn finalize_dataset(mut dataset: WideTable) -> WideTable {
    dataset.retain_years_from(FIRST_YEAR);

    dataset.zip_columns(
        "exports_pct_gdp",
        "imports_pct_gdp",
        "net_exports_pct_gdp",
        |exports, imports| exports - imports,
    );
    dataset.map_column("gdp_usd", "gdp_usd_log", |gdp| (gdp > 0.0).then(|| gdp.ln()));

    for base in LAG_BASES {
        dataset.add_lag_column(base);
    }

    dataset.select_columns(FINAL_COLUMNS);
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Point;

    fn pt(year: i32, value: f64) -> Point {
        Point { year, value: Some(value) }
    }

    #[test]
    fn zero_countries_with_data_is_fatal() {
        let err = stack_tables(vec![WideTable::new(), WideTable::new()]).unwrap_err();
        assert!(err.to_string().contains("no data collected for any country"));
    }

    #[test]
    fn partial_coverage_is_not_an_error() {
        let mut one = WideTable::new();
        one.merge_series("USA", "gdp_usd", &[pt(2020, 21.4)]);
        let dataset = stack_tables(vec![one, WideTable::new()]).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn exports_lag_example() {
        let mut t = WideTable::new();
        t.merge_series("USA", "exports_pct_gdp", &[pt(2020, 10.0), pt(2021, 12.0)]);
        let out = finalize_dataset(t);

        assert_eq!(out.get("USA", 2020, "exports_pct_gdp_lag1"), None);
        assert_eq!(out.get("USA", 2021, "exports_pct_gdp_lag1"), Some(10.0));
    }

    #[test]
    fn gdp_log_only_for_positive_values() {
        let mut t = WideTable::new();
        t.merge_series(
            "USA",
            "gdp_usd",
            &[
                pt(2019, -5.0),
                pt(2020, 0.0),
                pt(2021, 23.3),
                Point { year: 2022, value: None },
            ],
        );
        let out = finalize_dataset(t);

        assert_eq!(out.get("USA", 2019, "gdp_usd_log"), None);
        assert_eq!(out.get("USA", 2020, "gdp_usd_log"), None);
        assert_eq!(out.get("USA", 2021, "gdp_usd_log"), Some(23.3f64.ln()));
        assert_eq!(out.get("USA", 2022, "gdp_usd_log"), None);
    }

    #[test]
    fn net_exports_needs_both_inputs() {
        let mut t = WideTable::new();
        t.merge_series("USA", "exports_pct_gdp", &[pt(2020, 10.0), pt(2021, 12.0)]);
        t.merge_series("USA", "imports_pct_gdp", &[pt(2020, 14.5)]);
        let out = finalize_dataset(t);

        assert_eq!(out.get("USA", 2020, "net_exports_pct_gdp"), Some(-4.5));
        // 2021 has exports but no imports: null, not a partial difference.
        assert_eq!(out.get("USA", 2021, "net_exports_pct_gdp"), None);
    }

    #[test]
    fn failed_indicator_column_absent_unless_lag_base() {
        // Only gdp_usd fetched: raw columns for everything else are
        // absent, but every lag column still exists, null-filled.
        let mut t = WideTable::new();
        t.merge_series("USA", "gdp_usd", &[pt(2020, 21.4), pt(2021, 23.3)]);
        let out = finalize_dataset(t);

        assert!(!out.has_column("unemployment_pct"));
        assert!(out.has_column("unemployment_pct_lag1"));
        assert!(out.has_column("net_exports_pct_gdp"));
        assert!(out.has_column("gdp_usd_log"));
        assert_eq!(out.get("USA", 2021, "unemployment_pct_lag1"), None);
    }

    #[test]
    fn pre_1990_rows_are_dropped() {
        let mut t = WideTable::new();
        t.merge_series("USA", "gdp_usd", &[pt(1985, 4.3), pt(1990, 5.9), pt(2000, 10.2)]);
        let out = finalize_dataset(t);
        assert_eq!(out.len(), 2);
        assert_eq!(out.get("USA", 1985, "gdp_usd"), None);
    }

    #[test]
    fn output_columns_follow_canonical_order() {
        let mut t = WideTable::new();
        // Register out of canonical order on purpose.
        t.merge_series("USA", "unemployment_pct", &[pt(2020, 8.1)]);
        t.merge_series("USA", "gdp_usd", &[pt(2020, 21.4)]);
        let out = finalize_dataset(t);

        let positions: Vec<usize> = out
            .columns()
            .iter()
            .map(|c| {
                FINAL_COLUMNS
                    .iter()
                    .position(|f| *f == c.as_str())
                    .expect("column not canonical")
            })
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn years_ascend_within_each_country() {
        let mut usa = WideTable::new();
        usa.merge_series("USA", "gdp_usd", &[pt(2021, 1.0), pt(1995, 2.0), pt(2003, 3.0)]);
        let mut chn = WideTable::new();
        chn.merge_series("CHN", "gdp_usd", &[pt(2010, 4.0), pt(1999, 5.0)]);

        let out = finalize_dataset(stack_tables(vec![usa, chn]).unwrap());

        let mut last: Option<(&str, i32)> = None;
        for ((country, year), _) in out.iter_rows() {
            if let Some((prev_country, prev_year)) = last {
                if prev_country == country {
                    assert!(*year > prev_year);
                }
            }
            last = Some((country, *year));
        }
    }

    #[test]
    fn two_row_usa_scenario() {
        let mut t = WideTable::new();
        t.merge_series("USA", "gdp_usd", &[pt(2020, 21.4), pt(2021, 23.3)]);
        t.merge_series("USA", "exports_pct_gdp", &[pt(2020, 10.0), pt(2021, 12.0)]);
        let out = finalize_dataset(t);

        assert_eq!(out.len(), 2);
        assert_eq!(out.get("USA", 2020, "gdp_usd_log"), Some(21.4f64.ln()));
        assert_eq!(out.get("USA", 2021, "gdp_usd_log"), Some(23.3f64.ln()));
        assert_eq!(out.get("USA", 2020, "exports_pct_gdp_lag1"), None);
        assert_eq!(out.get("USA", 2021, "exports_pct_gdp_lag1"), Some(10.0));
    }
}
