//! `OpenRouteService` isochrone client.
//!
//! See <https://openrouteservice.org/dev/#/api-docs/v2/isochrones>

use async_trait::async_trait;
use catchment_models::IsochroneProperties;
use catchment_models::text::truncate_for_log;
use geo::MultiPolygon;
use geojson::GeoJson;

use crate::RoutingError;
use crate::routing::{Isochrone, IsochroneRequest, Router};

/// Public `OpenRouteService` API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";

/// Isochrone client for the `OpenRouteService` v2 API.
pub struct OrsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OrsClient {
    /// Creates a client for `base_url` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("catchment/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Router for OrsClient {
    async fn isochrones(
        &self,
        request: &IsochroneRequest,
    ) -> Result<Vec<Isochrone>, RoutingError> {
        let url = format!("{}/v2/isochrones/{}", self.base_url, request.profile);
        log::debug!(
            "Requesting {} isochrone, range={:?}s",
            request.profile,
            request.range
        );

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            log::warn!(
                "Isochrone request failed with HTTP {status}: {}",
                truncate_for_log(&body, 500)
            );
            return Err(RoutingError::Response {
                message: format!("HTTP {status} from {url}"),
            });
        }

        parse_isochrones(&body)
    }
}

/// Parses an isochrone `GeoJSON` `FeatureCollection`.
///
/// Features without a polygonal geometry are skipped.
///
/// # Errors
///
/// Returns [`RoutingError`] if the body is not a `FeatureCollection`.
pub fn parse_isochrones(body: &str) -> Result<Vec<Isochrone>, RoutingError> {
    let geojson: GeoJson = body.parse().map_err(|e| RoutingError::Response {
        message: format!("Failed to parse isochrone GeoJSON: {e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(RoutingError::Response {
            message: "Isochrone response is not a FeatureCollection".to_string(),
        });
    };

    let mut isochrones = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let Ok(geometry) = geo::Geometry::<f64>::try_from(geometry) else {
            log::warn!("Skipping isochrone with unconvertible geometry");
            continue;
        };
        let geometry = match geometry {
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            geo::Geometry::MultiPolygon(mp) => mp,
            _ => continue,
        };

        let property = |name: &str| {
            feature
                .properties
                .as_ref()
                .and_then(|props| props.get(name))
                .and_then(serde_json::Value::as_f64)
        };

        isochrones.push(Isochrone {
            properties: IsochroneProperties {
                area: property("area"),
                total_pop: property("total_pop"),
                value: property("value"),
            },
            geometry,
        });
    }

    Ok(isochrones)
}
