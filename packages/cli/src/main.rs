#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `catchment` command-line tool.
//!
//! Geocodes an address, draws a distance or travel-time catchment around
//! it and reports area, population, census variables and points of
//! interest as JSON. Service endpoints and API keys come from
//! `catchment.toml` (see [`config::Config`]).

mod config;
mod output;

use std::path::PathBuf;

use catchment_area::{CatchmentArea, Collaborators};
use catchment_census::acs::AcsClient;
use catchment_census_models::Normalization;
use catchment_geocoder::nominatim::NominatimClient;
use catchment_geography::interpolate::CoveragePolicy;
use catchment_geography::tigerweb::TigerWebClient;
use catchment_geometry::openrouteservice::OrsClient;
use catchment_geometry::routing::Router;
use catchment_models::TravelProfile;
use catchment_poi::aggregate::{category_counts, top_locations};
use catchment_poi::overpass::OverpassClient;
use catchment_poi_models::{PoiMetric, PoiSelection};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::output::{CatchmentReport, PoiReport};

#[derive(Parser)]
#[command(name = "catchment", about = "Catchment area analysis tool")]
struct Cli {
    /// Path to a TOML config file (defaults to `catchment.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a catchment around an address and report on it
    Generate {
        /// Free-form address to geocode
        #[arg(long)]
        address: String,
        /// "distance" (miles) or "travel-time" (minutes)
        #[arg(long)]
        mode: String,
        /// Radius in miles or minutes, depending on the mode
        #[arg(long)]
        radius: f64,
        /// Travel profile label or routing id (e.g. "Walking", "driving-car")
        #[arg(long)]
        profile: Option<String>,
        /// ACS 5-year vintage (overrides the config file)
        #[arg(long)]
        year: Option<u16>,
        /// Comma-separated census variable codes (e.g. `B19013_001E`)
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,
        /// Also report per-tract values divided by tract population
        #[arg(long)]
        normalize: bool,
        /// Only keep tracts covering more than this fraction of their area
        #[arg(long)]
        min_coverage: Option<f64>,
        /// Points of interest to look up, as `key=value1,value2`. Repeatable.
        #[arg(long = "poi")]
        pois: Vec<PoiSelection>,
        /// How to rank POI names: count, per-capita or distance
        #[arg(long, default_value = "count")]
        rank: PoiMetric,
        /// Print a GeoJSON `FeatureCollection` instead of a plain report
        #[arg(long)]
        geojson: bool,
    },
    /// List the census variables available for a year
    Variables {
        /// ACS 5-year vintage (overrides the config file)
        #[arg(long)]
        year: Option<u16>,
        /// Only list variables whose code, name or group contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// List the travel profiles accepted by `--profile`
    Profiles,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Profiles => {
            println!("{:<32} ROUTING ID", "PROFILE");
            println!("{}", "-".repeat(50));
            for profile in TravelProfile::ALL {
                let label = profile.to_string();
                println!("{label:<32} {}", profile.routing_profile());
            }
        }
        Commands::Variables { year, search } => {
            let config = Config::load(cli.config.as_deref())?;
            let year = year.unwrap_or(config.census.year);
            let statistics = AcsClient::new(&config.census.base_url, config.census.api_key);

            let catalog =
                catchment_census::catalog::fetch_variable_catalog(&statistics, year).await?;
            let matches: Vec<_> = match &search {
                Some(query) => catchment_census::catalog::search(&catalog, query),
                None => catalog.iter().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Commands::Generate {
            address,
            mode,
            radius,
            profile,
            year,
            variables,
            normalize,
            min_coverage,
            pois,
            rank,
            geojson,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let year = year.unwrap_or(config.census.year);

            let geocoder = NominatimClient::new(
                &config.geocoder.base_url,
                &config.geocoder.user_agent,
                config.geocoder.country_codes.clone(),
            )?;
            let router = config
                .routing
                .api_key
                .as_deref()
                .map(|key| OrsClient::new(&config.routing.base_url, key))
                .transpose()?;
            let boundaries = TigerWebClient::new(&config.boundaries.base_url)?;
            let statistics =
                AcsClient::new(&config.census.base_url, config.census.api_key.clone());
            let features =
                OverpassClient::new(&config.features.interpreter_url, &config.features.user_agent)?;

            let collaborators = Collaborators {
                router: router.as_ref().map(|r| r as &dyn Router),
                boundaries: Some(&boundaries),
                statistics: Some(&statistics),
                features: Some(&features),
            };

            let location = catchment_area::geocode(&geocoder, &address).await?;
            let spec = catchment_area::parse_spec(&mode, radius, profile.as_deref())?;

            let mut catchment = CatchmentArea::new(Some(location.clone()), spec);
            if let Some(fraction) = min_coverage {
                catchment =
                    catchment.with_coverage_policy(CoveragePolicy::MinimumFraction(fraction));
            }

            let geometry = catchment.generate_geometry(collaborators.router).await?.clone();
            let area_sq_miles = catchment.area_sq_miles()?;
            let total_population = catchment.total_population(&collaborators, year).await?;
            log::info!(
                "Catchment covers {area_sq_miles} sq mi with {total_population:.0} residents"
            );

            let demographics = if variables.is_empty() {
                Vec::new()
            } else {
                let descriptors =
                    catchment_area::resolve_variables(&collaborators, &variables, year).await?;
                let normalization = if normalize {
                    Normalization::ByPopulation
                } else {
                    Normalization::Off
                };
                catchment
                    .demographic_enrichment(&collaborators, &descriptors, year, normalization)
                    .await?
                    .summaries()
            };

            let points_of_interest: Vec<PoiReport> = if pois.is_empty() {
                Vec::new()
            } else {
                catchment
                    .poi_enrichment(&collaborators, &pois)
                    .await?
                    .iter()
                    .map(|outcome| PoiReport {
                        selection: outcome.selection.clone(),
                        status: outcome.status.clone(),
                        categories: category_counts(&outcome.records, total_population),
                        ranked_by: rank,
                        top_locations: top_locations(&outcome.records, rank, total_population),
                    })
                    .collect()
            };

            let report = CatchmentReport {
                location,
                spec,
                year,
                area_sq_miles,
                total_population,
                iso_properties: catchment.iso_properties().cloned(),
                census_tracts: catchment.census_tracts().len(),
                demographics,
                points_of_interest,
            };

            let json = if geojson {
                serde_json::to_string_pretty(&output::to_feature_collection(&geometry, &report)?)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_arguments() {
        let cli = Cli::parse_from([
            "catchment",
            "generate",
            "--address",
            "233 S Wacker Dr, Chicago",
            "--mode",
            "travel-time",
            "--radius",
            "15",
            "--profile",
            "Walking",
            "--variables",
            "B19013_001E,B01001_002E",
            "--poi",
            "amenity=cafe,restaurant",
            "--poi",
            "shop=supermarket",
            "--rank",
            "per-capita",
        ]);

        let Commands::Generate {
            variables,
            pois,
            rank,
            geojson,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(variables, vec!["B19013_001E", "B01001_002E"]);
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].values, vec!["cafe", "restaurant"]);
        assert_eq!(rank, PoiMetric::PerCapita);
        assert!(!geojson);
    }

    #[test]
    fn rank_defaults_to_count_and_rejects_unknown_metrics() {
        let base = [
            "catchment",
            "generate",
            "--address",
            "x",
            "--mode",
            "distance",
            "--radius",
            "5",
        ];

        let Commands::Generate { rank, .. } = Cli::parse_from(base).command else {
            panic!("expected generate");
        };
        assert_eq!(rank, PoiMetric::Count);

        let with_distance = Cli::parse_from(base.iter().copied().chain(["--rank", "distance"]));
        let Commands::Generate { rank, .. } = with_distance.command else {
            panic!("expected generate");
        };
        assert_eq!(rank, PoiMetric::Distance);

        assert!(Cli::try_parse_from(base.iter().copied().chain(["--rank", "loudest"])).is_err());
    }

    #[test]
    fn rejects_malformed_poi() {
        assert!(
            Cli::try_parse_from([
                "catchment",
                "generate",
                "--address",
                "x",
                "--mode",
                "distance",
                "--radius",
                "5",
                "--poi",
                "amenity",
            ])
            .is_err()
        );
    }
}
