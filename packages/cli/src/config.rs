//! TOML configuration for the external services.
//!
//! Every field has a default, so the tool runs without a config file.
//! `CENSUS_API_KEY` and `ORS_API_KEY` override the keys from the file.

use std::path::Path;

use serde::Deserialize;

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "catchment.toml";

const DEFAULT_USER_AGENT: &str = "catchment/0.1 (https://github.com/catchment-explorer/catchment)";

/// ACS 5-year vintage used when neither the command line nor the config
/// file names one.
pub const DEFAULT_YEAR: u16 = 2022;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub census: CensusConfig,
    pub routing: RoutingConfig,
    pub boundaries: BoundariesConfig,
    pub features: FeaturesConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CensusConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub year: u16,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            base_url: catchment_census::acs::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            year: DEFAULT_YEAR,
        }
    }
}

/// `OpenRouteService` settings. Travel-time catchments need an API key.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: catchment_geometry::openrouteservice::DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundariesConfig {
    pub base_url: String,
}

impl Default for BoundariesConfig {
    fn default() -> Self {
        Self {
            base_url: catchment_geography::tigerweb::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesConfig {
    pub interpreter_url: String,
    pub user_agent: String,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            interpreter_url: catchment_poi::overpass::DEFAULT_INTERPRETER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Comma-separated ISO country codes matches are restricted to.
    pub country_codes: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: catchment_geocoder::nominatim::DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_codes: Some("us".to_string()),
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from [`DEFAULT_CONFIG_PATH`] when
    /// it exists, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file cannot be read or if
    /// either file is not valid config TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        });

        let mut config = match path {
            Some(path) => {
                log::debug!("Reading config from {}", path.display());
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
                Self::parse(&text)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parses config TOML.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("CENSUS_API_KEY").filter(|k| !k.is_empty()) {
            self.census.api_key = Some(key);
        }
        if let Some(key) = var("ORS_API_KEY").filter(|k| !k.is_empty()) {
            self.routing.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.census.year, DEFAULT_YEAR);
        assert_eq!(
            config.geocoder.base_url,
            catchment_geocoder::nominatim::DEFAULT_BASE_URL
        );
        assert!(config.routing.api_key.is_none());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [census]
            year = 2021
            api_key = "abc"

            [routing]
            api_key = "ors-key"
            "#,
        )
        .unwrap();
        assert_eq!(config.census.year, 2021);
        assert_eq!(config.census.api_key.as_deref(), Some("abc"));
        assert_eq!(config.census.base_url, catchment_census::acs::DEFAULT_BASE_URL);
        assert_eq!(config.routing.api_key.as_deref(), Some("ors-key"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::parse("[census]\nyaer = 2021\n").is_err());
    }

    #[test]
    fn environment_overrides_keys() {
        let mut config = Config::parse("[census]\napi_key = \"from-file\"\n").unwrap();
        config.apply_env_overrides(|name| match name {
            "CENSUS_API_KEY" => Some("from-env".to_string()),
            "ORS_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.census.api_key.as_deref(), Some("from-env"));
        assert!(config.routing.api_key.is_none());
    }
}
