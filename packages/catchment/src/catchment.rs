//! The catchment area aggregate.

use catchment_census::aggregate::{DemographicTable, fetch_tract_estimates};
use catchment_census_models::{Normalization, VariableDescriptor};
use catchment_geography::interpolate::{CoveragePolicy, overlapping_tracts};
use catchment_geography_models::TractRecord;
use catchment_geometry::area::area_sq_miles;
use catchment_geometry::builder;
use catchment_geometry::routing::Router;
use catchment_models::{CatchmentSpec, IsochroneProperties, Location};
use catchment_poi::aggregate::find_pois;
use catchment_poi_models::{PoiOutcome, PoiSelection};
use geo::{MultiPolygon, Point};

use crate::{CatchmentError, Collaborators};

/// A catchment polygon around one location plus everything derived from
/// it.
///
/// The geometry is generated once. Derived values are computed on first
/// request and cached; tract sets, population and census data are cached
/// per census year and recomputed when another year is requested.
#[derive(Debug, Clone)]
pub struct CatchmentArea {
    location: Option<Location>,
    spec: CatchmentSpec,
    coverage_policy: CoveragePolicy,
    geometry: Option<MultiPolygon<f64>>,
    iso_properties: Option<IsochroneProperties>,
    area_sq_miles: Option<f64>,
    total_population: Option<(u16, f64)>,
    census_tracts: Option<(u16, Vec<TractRecord>)>,
    census_data: Option<DemographicTable>,
    poi_data: Vec<PoiOutcome>,
}

impl CatchmentArea {
    #[must_use]
    pub fn new(location: Option<Location>, spec: CatchmentSpec) -> Self {
        Self {
            location,
            spec,
            coverage_policy: CoveragePolicy::default(),
            geometry: None,
            iso_properties: None,
            area_sq_miles: None,
            total_population: None,
            census_tracts: None,
            census_data: None,
            poi_data: Vec::new(),
        }
    }

    /// Uses `policy` to decide which overlapping tracts count.
    #[must_use]
    pub fn with_coverage_policy(mut self, policy: CoveragePolicy) -> Self {
        self.coverage_policy = policy;
        self
    }

    #[must_use]
    pub const fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    #[must_use]
    pub const fn spec(&self) -> &CatchmentSpec {
        &self.spec
    }

    /// The catchment polygon, once generated.
    #[must_use]
    pub const fn geometry(&self) -> Option<&MultiPolygon<f64>> {
        self.geometry.as_ref()
    }

    /// Properties returned with a travel-time isochrone.
    #[must_use]
    pub const fn iso_properties(&self) -> Option<&IsochroneProperties> {
        self.iso_properties.as_ref()
    }

    /// Tracts overlapping the catchment, once loaded.
    #[must_use]
    pub fn census_tracts(&self) -> &[TractRecord] {
        self.census_tracts
            .as_ref()
            .map(|(_, tracts)| tracts.as_slice())
            .unwrap_or_default()
    }

    /// The latest demographic enrichment.
    #[must_use]
    pub const fn census_data(&self) -> Option<&DemographicTable> {
        self.census_data.as_ref()
    }

    /// The latest POI enrichment, one outcome per selection.
    #[must_use]
    pub fn poi_data(&self) -> &[PoiOutcome] {
        &self.poi_data
    }

    /// Builds the catchment polygon.
    ///
    /// # Errors
    ///
    /// * [`CatchmentError::InvalidInput`] if the location is missing, a
    ///   travel-time catchment has no router, or the geometry was already
    ///   generated
    /// * [`CatchmentError::ExternalService`] if the router fails
    pub async fn generate_geometry(
        &mut self,
        router: Option<&dyn Router>,
    ) -> Result<&MultiPolygon<f64>, CatchmentError> {
        if self.geometry.is_some() {
            return Err(CatchmentError::InvalidInput {
                message: "Catchment geometry has already been generated".to_string(),
            });
        }

        let generated =
            builder::generate_geometry(self.location.as_ref(), &self.spec, router).await?;

        self.iso_properties = generated.iso_properties;
        Ok(&*self.geometry.insert(generated.geometry))
    }

    fn require_geometry(&self) -> Result<&MultiPolygon<f64>, CatchmentError> {
        self.geometry.as_ref().ok_or(CatchmentError::NotReady)
    }

    /// Area in square miles, rounded to 2 decimals.
    ///
    /// # Errors
    ///
    /// Returns [`CatchmentError::NotReady`] before the geometry exists.
    pub fn area_sq_miles(&mut self) -> Result<f64, CatchmentError> {
        if let Some(area) = self.area_sq_miles {
            return Ok(area);
        }
        let area = area_sq_miles(self.require_geometry()?);
        self.area_sq_miles = Some(area);
        Ok(area)
    }

    /// Estimated population inside the catchment.
    ///
    /// Travel-time catchments use the routing provider's `total_pop` when
    /// it was returned. Otherwise the overlapping tracts' populations are
    /// summed after scaling each by its coverage fraction.
    ///
    /// # Errors
    ///
    /// * [`CatchmentError::NotReady`] before the geometry exists
    /// * [`CatchmentError::InvalidInput`] if a needed client is missing
    /// * [`CatchmentError::ExternalService`] if a provider fails
    pub async fn total_population(
        &mut self,
        collaborators: &Collaborators<'_>,
        year: u16,
    ) -> Result<f64, CatchmentError> {
        if let Some((_, population)) =
            self.total_population.filter(|(cached, _)| *cached == year)
        {
            return Ok(population);
        }

        if let (CatchmentSpec::TravelTime { .. }, Some(population)) = (
            &self.spec,
            self.iso_properties.as_ref().and_then(|p| p.total_pop),
        ) {
            log::info!("Using routing provider population estimate: {population}");
            self.total_population = Some((year, population));
            return Ok(population);
        }

        let table = self
            .fetch_table(
                collaborators,
                &[VariableDescriptor::total_population()],
                year,
                Normalization::Off,
            )
            .await?;

        let population = table.total_population();
        log::info!("Interpolated population from tracts: {population:.0}");
        self.total_population = Some((year, population));
        Ok(population)
    }

    /// Fetches `variables` for the overlapping tracts and stores the
    /// interpolated table as the catchment's census data.
    ///
    /// An empty tract set yields an empty table.
    ///
    /// # Errors
    ///
    /// * [`CatchmentError::NotReady`] before the geometry exists
    /// * [`CatchmentError::InvalidInput`] if a needed client is missing
    /// * [`CatchmentError::ExternalService`] if a provider fails
    pub async fn demographic_enrichment(
        &mut self,
        collaborators: &Collaborators<'_>,
        variables: &[VariableDescriptor],
        year: u16,
        normalization: Normalization,
    ) -> Result<&DemographicTable, CatchmentError> {
        let table = self
            .fetch_table(collaborators, variables, year, normalization)
            .await?;
        Ok(&*self.census_data.insert(table))
    }

    async fn fetch_table(
        &mut self,
        collaborators: &Collaborators<'_>,
        variables: &[VariableDescriptor],
        year: u16,
        normalization: Normalization,
    ) -> Result<DemographicTable, CatchmentError> {
        self.require_geometry()?;
        let statistics = collaborators.statistics()?;
        let tracts = self.load_tracts(collaborators, year).await?;
        Ok(fetch_tract_estimates(statistics, tracts, variables, normalization, year).await?)
    }

    /// Tracts overlapping the catchment for `year`, loaded on first use.
    async fn load_tracts(
        &mut self,
        collaborators: &Collaborators<'_>,
        year: u16,
    ) -> Result<&[TractRecord], CatchmentError> {
        let cached = matches!(&self.census_tracts, Some((cached_year, _)) if *cached_year == year);

        if !cached {
            let geometry = self.require_geometry()?;
            let tracts = overlapping_tracts(
                collaborators.boundaries()?,
                geometry,
                year,
                self.coverage_policy,
            )
            .await?;
            self.census_tracts = Some((year, tracts));
        }

        Ok(self.census_tracts())
    }

    /// Looks up points of interest for each selection and stores the
    /// outcomes as the catchment's POI data.
    ///
    /// Selections with no matches or a failed lookup produce empty
    /// outcomes tagged [`PoiStatus::NoData`](catchment_poi_models::PoiStatus::NoData)
    /// or [`PoiStatus::Failed`](catchment_poi_models::PoiStatus::Failed)
    /// instead of errors.
    ///
    /// # Errors
    ///
    /// * [`CatchmentError::NotReady`] before the geometry exists
    /// * [`CatchmentError::InvalidInput`] if the features client or the
    ///   location is missing
    pub async fn poi_enrichment(
        &mut self,
        collaborators: &Collaborators<'_>,
        selections: &[PoiSelection],
    ) -> Result<&[PoiOutcome], CatchmentError> {
        let geometry = self.require_geometry()?;
        let features = collaborators.features()?;
        let location = self
            .location
            .as_ref()
            .ok_or_else(|| CatchmentError::InvalidInput {
                message: "Invalid location.".to_string(),
            })?;
        let reference = Point::new(location.longitude, location.latitude);

        let mut outcomes = Vec::with_capacity(selections.len());
        for selection in selections {
            outcomes.push(find_pois(features, geometry, reference, selection).await);
        }

        self.poi_data = outcomes;
        Ok(&self.poi_data)
    }
}
