//! Census boundaries from the Census Bureau `TIGERweb` REST API.
//!
//! States come from layer 84 and tracts from layer 8 of the
//! `tigerWMS_ACS{year}` map service, requested as `GeoJSON` in WGS84.

use async_trait::async_trait;
use catchment_geography_models::{StateBoundary, TractBoundary};
use catchment_models::text::truncate_for_log;
use geo::MultiPolygon;
use serde::Deserialize;

use crate::{BoundaryProvider, GeoError};

/// Default root of the `TIGERweb` map services.
pub const DEFAULT_BASE_URL: &str = "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb";

/// Page size for `TIGERweb` paginated requests. Kept low to avoid WAF
/// blocks on large geospatial responses.
const TIGERWEB_PAGE_SIZE: usize = 100;

/// Map service layer holding state boundaries.
const STATES_LAYER: u32 = 84;

/// Map service layer holding census tract boundaries.
const TRACTS_LAYER: u32 = 8;

/// Browser-like User-Agent to avoid WAF blocks on `TIGERweb`.
const TIGERWEB_USER_AGENT: &str = "Mozilla/5.0 (compatible; Catchment/1.0; +https://github.com)";

/// [`BoundaryProvider`] backed by `TIGERweb`.
pub struct TigerWebClient {
    client: reqwest::Client,
    base_url: String,
}

impl TigerWebClient {
    /// Creates a client for the map services under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .user_agent(TIGERWEB_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn layer_query_url(
        &self,
        year: u16,
        layer: u32,
        where_clause: &str,
        out_fields: &str,
    ) -> String {
        format!(
            "{}/tigerWMS_ACS{year}/MapServer/{layer}/query\
             ?where={where_clause}\
             &outFields={out_fields}\
             &outSR=4326\
             &f=geojson\
             &returnGeometry=true",
            self.base_url
        )
    }

    /// Pages through a layer query with `resultOffset`, converting each
    /// page's features with `parse` as it arrives. Stops when a page is
    /// empty or `ArcGIS` no longer reports `exceededTransferLimit`.
    async fn query_layer<T>(
        &self,
        url: &str,
        label: &str,
        parse: fn(&serde_json::Value) -> Option<T>,
    ) -> Result<Vec<T>, GeoError> {
        let mut parsed = Vec::new();
        let mut offset = 0_usize;

        loop {
            let body = self.get_page(url, label, offset).await?;
            let page = parse_page(&body, label)?;
            let fetched = page.features.len();

            parsed.extend(page.features.iter().filter_map(parse));

            if fetched == 0 || !page.has_more() {
                break;
            }
            offset += fetched;
            log::debug!("{label}: {} boundaries after {offset} features", parsed.len());
        }

        Ok(parsed)
    }

    async fn get_page(&self, url: &str, label: &str, offset: usize) -> Result<String, GeoError> {
        let resp = self
            .client
            .get(url)
            .query(&[("resultRecordCount", TIGERWEB_PAGE_SIZE), ("resultOffset", offset)])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            log::warn!(
                "{label} (offset={offset}): HTTP {status}. Response body: {}",
                truncate_for_log(&body, 500)
            );
            return Err(GeoError::Conversion {
                message: format!("TIGERweb request for {label} failed with HTTP {status}"),
            });
        }

        Ok(body)
    }
}

/// One page of an `ArcGIS` `f=geojson` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    features: Vec<serde_json::Value>,
    #[serde(default)]
    exceeded_transfer_limit: bool,
    #[serde(default)]
    properties: Option<PageProperties>,
    error: Option<ArcGisError>,
}

/// Some server versions report the transfer limit under `properties`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProperties {
    #[serde(default)]
    exceeded_transfer_limit: bool,
}

#[derive(Debug, Deserialize)]
struct ArcGisError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl QueryPage {
    fn has_more(&self) -> bool {
        self.exceeded_transfer_limit
            || self
                .properties
                .as_ref()
                .is_some_and(|p| p.exceeded_transfer_limit)
    }
}

/// Parses a query page. `ArcGIS` reports failures as HTTP 200 with an
/// `error` object, which becomes [`GeoError::Conversion`].
fn parse_page(body: &str, label: &str) -> Result<QueryPage, GeoError> {
    let page: QueryPage = serde_json::from_str(body)?;
    if let Some(error) = &page.error {
        return Err(GeoError::Conversion {
            message: format!("ArcGIS error {} for {label}: {}", error.code, error.message),
        });
    }
    Ok(page)
}

#[async_trait]
impl BoundaryProvider for TigerWebClient {
    async fn state_boundaries(&self, year: u16) -> Result<Vec<StateBoundary>, GeoError> {
        let url = self.layer_query_url(year, STATES_LAYER, "1%3D1", "GEOID,STATE,NAME");
        let label = format!("state boundaries ({year})");
        log::info!("Fetching {label}...");

        self.query_layer(&url, &label, parse_state_feature).await
    }

    async fn tract_boundaries(
        &self,
        state_fips: &str,
        year: u16,
    ) -> Result<Vec<TractBoundary>, GeoError> {
        let url = self.layer_query_url(
            year,
            TRACTS_LAYER,
            &format!("STATE%3D%27{state_fips}%27"),
            "GEOID,STATE,COUNTY,AREALAND",
        );
        let label = format!("tracts for state {state_fips} ({year})");
        log::info!("Fetching {label}...");

        self.query_layer(&url, &label, parse_tract_feature).await
    }
}

/// Parses a `TIGERweb` state feature. Returns `None` for features without
/// a FIPS code or a polygonal geometry.
fn parse_state_feature(feature: &serde_json::Value) -> Option<StateBoundary> {
    let props = &feature["properties"];
    let geoid = props["STATE"]
        .as_str()
        .or_else(|| props["GEOID"].as_str())
        .filter(|s| !s.is_empty())?
        .to_string();

    let Some(geometry) = parse_multipolygon(&feature["geometry"]) else {
        log::warn!("Failed to parse GeoJSON for state {geoid}");
        return None;
    };

    Some(StateBoundary {
        geoid,
        name: props["NAME"].as_str().map(String::from),
        geometry,
    })
}

/// Parses a `TIGERweb` tract feature. Returns `None` for features without
/// a GEOID or a polygonal geometry.
fn parse_tract_feature(feature: &serde_json::Value) -> Option<TractBoundary> {
    let props = &feature["properties"];
    let geoid = props["GEOID"]
        .as_str()
        .filter(|s| !s.is_empty())?
        .to_string();

    let aland = props["AREALAND"]
        .as_f64()
        .or_else(|| {
            props["AREALAND"]
                .as_str()
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    let Some(geometry) = parse_multipolygon(&feature["geometry"]) else {
        log::warn!("Failed to parse GeoJSON for tract {geoid}");
        return None;
    };

    Some(TractBoundary {
        geoid,
        aland,
        geometry,
    })
}

/// Parse a `GeoJSON` geometry object into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn parse_multipolygon(value: &serde_json::Value) -> Option<MultiPolygon<f64>> {
    let geometry: geojson::Geometry = serde_json::from_value(value.clone()).ok()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}
