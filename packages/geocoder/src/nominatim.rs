//! Nominatim / `OpenStreetMap` geocoder client.
//!
//! The public instance allows **1 request per second** and requires an
//! identifying User-Agent. One lookup is made per catchment, so no client
//! side throttling is done.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;
use catchment_models::Location;

use crate::{GeocodeError, Geocoder};

/// Public Nominatim search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// [`Geocoder`] backed by Nominatim free-form search.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    country_codes: Option<String>,
}

impl NominatimClient {
    /// Creates a client. `country_codes` (e.g. `"us"`) restricts matches
    /// when set.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        country_codes: Option<String>,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            country_codes: country_codes.filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, address: &str) -> Result<Option<Location>, GeocodeError> {
        log::info!("Geocoding '{address}'...");

        let mut query = vec![("q", address), ("format", "jsonv2"), ("limit", "1")];
        if let Some(codes) = &self.country_codes {
            query.push(("countrycodes", codes.as_str()));
        }

        let resp = self.client.get(&self.base_url).query(&query).send().await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.json().await?;
        let location = parse_response(&body, address)?;

        match &location {
            Some(l) => log::debug!("'{address}' -> ({}, {})", l.latitude, l.longitude),
            None => log::warn!("No geocoding match for '{address}'"),
        }

        Ok(location)
    }
}

/// Parses a Nominatim JSON response. The display name falls back to the
/// queried address when absent.
fn parse_response(
    body: &serde_json::Value,
    address: &str,
) -> Result<Option<Location>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"].as_str().unwrap_or(address);

    Ok(Some(Location::new(lat, lon, display_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "41.8827",
            "lon": "-87.6278",
            "display_name": "100, North State Street, Chicago, IL, USA"
        }]);
        let result = parse_response(&body, "100 N State St, Chicago")
            .unwrap()
            .unwrap();
        assert!((result.latitude - 41.8827).abs() < 1e-4);
        assert!((result.longitude - -87.6278).abs() < 1e-4);
        assert_eq!(result.address, "100, North State Street, Chicago, IL, USA");
    }

    #[test]
    fn falls_back_to_query_for_display_name() {
        let body = serde_json::json!([{ "lat": "41.9", "lon": "-87.65" }]);
        let result = parse_response(&body, "Lincoln Park").unwrap().unwrap();
        assert_eq!(result.address, "Lincoln Park");
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body, "nowhere").unwrap().is_none());
    }

    #[test]
    fn rejects_missing_coordinates() {
        let body = serde_json::json!([{ "display_name": "Somewhere" }]);
        assert!(matches!(
            parse_response(&body, "x"),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
