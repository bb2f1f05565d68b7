// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Default World Bank API root.
pub const WB_API_BASE: &str = "https://api.worldbank.org/v2";

/// One page is plenty: no indicator series comes close to 2000 years.
const PER_PAGE: u32 = 2000;

/// A single observation in an indicator series. The upstream API reports
/// missing years with a null value; those rows are kept so the year still
/// appears in the merged table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub year: i32,
    pub value: Option<f64>,
}

/// Per-year record inside the World Bank payload. Only the fields we use;
/// the rest of the record (country, decimal, obs_status…) is ignored.
#[derive(Debug, Deserialize)]
struct WbRecord {
    date: Option<String>,
    value: Option<f64>,
}

/// Thin client for the World Bank indicator API. Holds the shared
/// `reqwest::Client` it was constructed with; no global state.
#[derive(Debug, Clone)]
pub struct WorldBank {
    client: Client,
    base: Url,
}

impl WorldBank {
    pub fn new(client: Client) -> Self {
        let base = Url::parse(WB_API_BASE).expect("default API base URL should be valid");
        Self { client, base }
    }

    /// Point the client at a different API root (tests, mirrors).
    pub fn with_base(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Fetch the full series for one (country, indicator) pair.
    ///
    /// One request, no retries. Any transport, status, or payload-shape
    /// problem surfaces as an error; the caller decides whether that is
    /// fatal (for this pipeline it never is; the merger logs and moves on).
    pub async fn fetch_series(&self, country: &str, indicator: &str) -> Result<Vec<Point>> {
        let url = self.series_url(country, indicator)?;
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?
            .error_for_status()
            .with_context(|| format!("bad status from {}", url))?
            .text()
            .await
            .context("reading response body")?;

        parse_payload(&body).with_context(|| format!("parsing payload from {}", url))
    }

    fn series_url(&self, country: &str, indicator: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base cannot be a base URL"))?
            .extend(["country", country, "indicator", indicator]);
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("per_page", &PER_PAGE.to_string());
        Ok(url)
    }
}

/// Parse the two-element World Bank payload: `[metadata, [records…]]`.
///
/// Error responses come back as a one-element array with a message object,
/// which fails the tuple match below and surfaces as an error. Records
/// whose `date` is not an integer year are discarded.
fn parse_payload(body: &str) -> Result<Vec<Point>> {
    let (_meta, records): (serde_json::Value, Option<Vec<WbRecord>>) =
        serde_json::from_str(body).context("payload is not a [metadata, records] array")?;

    let points = records
        .unwrap_or_default()
        .into_iter()
        .filter_map(|rec| {
            let year = rec.date?.trim().parse::<i32>().ok()?;
            Some(Point { year, value: rec.value })
        })
        .collect();

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_discards_bad_years() {
        let body = r#"[
            {"page": 1, "pages": 1, "per_page": 2000, "total": 3},
            [
                {"country": {"id": "US", "value": "United States"}, "date": "2021", "value": 23.3},
                {"country": {"id": "US", "value": "United States"}, "date": "2020", "value": null},
                {"country": {"id": "US", "value": "United States"}, "date": "MRV", "value": 1.0}
            ]
        ]"#;
        let points = parse_payload(body).unwrap();
        assert_eq!(
            points,
            vec![
                Point { year: 2021, value: Some(23.3) },
                Point { year: 2020, value: None },
            ]
        );
    }

    #[test]
    fn null_record_list_is_empty() {
        let body = r#"[{"page": 1, "total": 0}, null]"#;
        assert!(parse_payload(body).unwrap().is_empty());
    }

    #[test]
    fn error_payload_is_an_error() {
        // The API reports bad indicator codes as a one-element array.
        let body = r#"[{"message": [{"id": "120", "value": "Invalid indicator"}]}]"#;
        assert!(parse_payload(body).is_err());
    }

    #[test]
    fn series_url_shape() {
        let wb = WorldBank::new(Client::new());
        let url = wb.series_url("USA", "NY.GDP.MKTP.CD").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.worldbank.org/v2/country/USA/indicator/NY.GDP.MKTP.CD?format=json&per_page=2000"
        );
    }
}
