//! American Community Survey 5-year estimates from `api.census.gov`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use catchment_census_models::{CatalogEntry, StatisticsRow};
use catchment_models::text::truncate_for_log;

use crate::{CensusError, StatisticsProvider};

/// Default root of the Census data API.
pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";

/// [`StatisticsProvider`] backed by the ACS 5-year API.
pub struct AcsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AcsClient {
    /// Creates a client. Requests are keyless when `api_key` is `None`,
    /// which the API allows at a low daily rate.
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn estimates_url(&self, codes: &[String], state: &str, county: &str, year: u16) -> String {
        let mut url = format!(
            "{}/{year}/acs/acs5\
             ?get={}\
             &for=tract:*\
             &in=state:{state}%20county:{county}",
            self.base_url,
            codes.join(",")
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }
        url
    }

    async fn get_text(&self, url: &str, label: &str) -> Result<String, CensusError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            log::warn!(
                "{label}: HTTP {status}. Response body: {}",
                truncate_for_log(&body, 500)
            );
            return Err(CensusError::Conversion {
                message: format!("Census request for {label} failed with HTTP {status}"),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl StatisticsProvider for AcsClient {
    async fn tract_statistics(
        &self,
        codes: &[String],
        state: &str,
        county: &str,
        year: u16,
    ) -> Result<Vec<StatisticsRow>, CensusError> {
        let label = format!("ACS {year} estimates for county {state}{county}");
        log::info!("Fetching {label} ({} variables)...", codes.len());

        let url = self.estimates_url(codes, state, county, year);
        let body = self.get_text(&url, &label).await?;
        let rows = parse_tract_rows(&body)?;

        log::debug!("{label}: {} tracts", rows.len());
        Ok(rows)
    }

    async fn variable_catalog(&self, year: u16) -> Result<Vec<CatalogEntry>, CensusError> {
        let label = format!("ACS {year} variable catalog");
        log::info!("Fetching {label}...");

        let url = format!("{}/{year}/acs/acs5/variables.json", self.base_url);
        let body = self.get_text(&url, &label).await?;
        parse_variables(&body)
    }
}

/// Parses an ACS table response.
///
/// The response is a JSON array of arrays whose first row is the header:
///
/// ```text
/// [["B01003_001E","B19013_001E","state","county","tract"],
///  ["4012","61250","17","031","081500"], ...]
/// ```
///
/// Every header column other than the geography columns is a variable.
/// Values that are null or not numeric become `None`.
///
/// # Errors
///
/// Returns [`CensusError`] if the body is not a table or lacks the
/// geography columns.
pub fn parse_tract_rows(body: &str) -> Result<Vec<StatisticsRow>, CensusError> {
    let table: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(body).map_err(|e| CensusError::Conversion {
            message: format!("Failed to parse ACS response: {e}"),
        })?;

    let Some((header, rows)) = table.split_first() else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = header
        .iter()
        .map(|h| h.as_str().unwrap_or_default())
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| CensusError::Conversion {
                message: format!("ACS response has no '{name}' column"),
            })
    };
    let state_col = column("state")?;
    let county_col = column("county")?;
    let tract_col = column("tract")?;

    let variable_cols: Vec<(usize, &str)> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| ![state_col, county_col, tract_col].contains(i))
        .map(|(i, h)| (i, *h))
        .collect();

    let mut parsed = Vec::with_capacity(rows.len());

    for row in rows {
        if row.len() < header.len() {
            continue;
        }

        let text = |i: usize| row[i].as_str().unwrap_or_default().to_string();

        let values = variable_cols
            .iter()
            .map(|(i, code)| ((*code).to_string(), parse_value(&row[*i])))
            .collect::<BTreeMap<_, _>>();

        parsed.push(StatisticsRow {
            state: text(state_col),
            county: text(county_col),
            tract: text(tract_col),
            values,
        });
    }

    Ok(parsed)
}

fn parse_value(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
}

/// Parses the `variables.json` catalog, keeping only estimate variables.
///
/// # Errors
///
/// Returns [`CensusError`] if the body has no `variables` object.
pub fn parse_variables(body: &str) -> Result<Vec<CatalogEntry>, CensusError> {
    let json: serde_json::Value = serde_json::from_str(body)?;
    let variables = json["variables"]
        .as_object()
        .ok_or_else(|| CensusError::Conversion {
            message: "No variables object in ACS catalog".to_string(),
        })?;

    Ok(variables
        .iter()
        .filter_map(|(code, entry)| {
            let label = entry["label"].as_str()?;
            label.contains("Estimate").then(|| CatalogEntry {
                code: code.clone(),
                label: label.to_string(),
                concept: entry["concept"].as_str().map(String::from),
            })
        })
        .collect())
}
