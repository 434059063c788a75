//! Variable catalog cleanup and lookup.

use catchment_census_models::{CatalogEntry, TOTAL_POPULATION_VARIABLE, VariableDescriptor};

use crate::{CensusError, StatisticsProvider};

/// Fetches the catalog for `year` and turns it into descriptors sorted by
/// code.
///
/// # Errors
///
/// Returns [`CensusError`] if the provider fails.
pub async fn fetch_variable_catalog(
    provider: &dyn StatisticsProvider,
    year: u16,
) -> Result<Vec<VariableDescriptor>, CensusError> {
    let entries = provider.variable_catalog(year).await?;
    let catalog = build_catalog(&entries, year);
    log::info!("ACS {year} catalog: {} estimate variables", catalog.len());
    Ok(catalog)
}

/// Cleans raw catalog entries into descriptors sorted by code.
#[must_use]
pub fn build_catalog(entries: &[CatalogEntry], year: u16) -> Vec<VariableDescriptor> {
    let mut catalog: Vec<VariableDescriptor> = entries
        .iter()
        .filter(|entry| entry.label.contains("Estimate"))
        .map(|entry| {
            let group = entry
                .concept
                .as_deref()
                .map_or_else(String::new, |concept| clean_concept(concept, year));
            VariableDescriptor::new(&entry.code, group, clean_label(&entry.label, year))
        })
        .collect();

    catalog.sort_by(|a, b| a.code.cmp(&b.code));
    catalog
}

/// `"Estimate!!Total:!!Male:"` becomes `"Total: Male:"`.
#[must_use]
pub fn clean_label(label: &str, year: u16) -> String {
    label
        .replace("Estimate!!", "")
        .replace("!!", " ")
        .replace(&format!(" (in {year} inflation-adjusted dollars)"), "")
        .trim()
        .to_string()
}

fn clean_concept(concept: &str, year: u16) -> String {
    concept
        .replace(&format!(" (IN {year} INFLATION-ADJUSTED DOLLARS)"), "")
        .replace(&format!(" (in {year} Inflation-Adjusted Dollars)"), "")
        .trim()
        .to_string()
}

/// Looks up `codes` in `catalog`, preserving the requested order and
/// dropping repeats.
///
/// The total-population variable is always accepted and always treated as
/// a count.
///
/// # Errors
///
/// Returns [`CensusError::UnsupportedVariable`] for the first code that
/// is not in the catalog.
pub fn resolve_variables(
    catalog: &[VariableDescriptor],
    codes: &[String],
) -> Result<Vec<VariableDescriptor>, CensusError> {
    let mut resolved: Vec<VariableDescriptor> = Vec::with_capacity(codes.len());

    for code in codes {
        if resolved.iter().any(|v| &v.code == code) {
            continue;
        }

        let descriptor = if code == TOTAL_POPULATION_VARIABLE {
            VariableDescriptor::total_population()
        } else {
            catalog
                .iter()
                .find(|v| &v.code == code)
                .cloned()
                .ok_or_else(|| CensusError::UnsupportedVariable { code: code.clone() })?
        };
        resolved.push(descriptor);
    }

    Ok(resolved)
}

/// Catalog entries whose code, group or name contains `query`,
/// case-insensitively.
#[must_use]
pub fn search<'a>(catalog: &'a [VariableDescriptor], query: &str) -> Vec<&'a VariableDescriptor> {
    let query = query.to_lowercase();
    catalog
        .iter()
        .filter(|v| {
            v.code.to_lowercase().contains(&query)
                || v.group.to_lowercase().contains(&query)
                || v.display_name.to_lowercase().contains(&query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use catchment_census_models::VariableType;

    use super::*;

    fn entry(code: &str, label: &str, concept: &str) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            label: label.to_string(),
            concept: Some(concept.to_string()),
        }
    }

    fn catalog() -> Vec<VariableDescriptor> {
        build_catalog(
            &[
                entry(
                    "B19013_001E",
                    "Estimate!!Median household income in the past 12 months (in 2022 inflation-adjusted dollars)",
                    "MEDIAN HOUSEHOLD INCOME IN THE PAST 12 MONTHS (IN 2022 INFLATION-ADJUSTED DOLLARS)",
                ),
                entry("B01001_002E", "Estimate!!Total:!!Male:", "SEX BY AGE"),
                entry("B01001_002M", "Margin of Error!!Total:!!Male:", "SEX BY AGE"),
            ],
            2022,
        )
    }

    #[test]
    fn cleans_and_classifies() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);

        assert_eq!(catalog[0].code, "B01001_002E");
        assert_eq!(catalog[0].display_name, "Total: Male:");
        assert_eq!(catalog[0].group, "SEX BY AGE");
        assert_eq!(catalog[0].variable_type, VariableType::PopulationCount);

        assert_eq!(
            catalog[1].display_name,
            "Median household income in the past 12 months"
        );
        assert_eq!(catalog[1].group, "MEDIAN HOUSEHOLD INCOME IN THE PAST 12 MONTHS");
        assert_eq!(catalog[1].variable_type, VariableType::OtherMetric);
    }

    #[test]
    fn resolves_in_request_order() {
        let resolved = resolve_variables(
            &catalog(),
            &[
                "B19013_001E".to_string(),
                TOTAL_POPULATION_VARIABLE.to_string(),
                "B19013_001E".to_string(),
            ],
        )
        .unwrap();

        let codes: Vec<&str> = resolved.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec!["B19013_001E", TOTAL_POPULATION_VARIABLE]);
        assert_eq!(resolved[1].variable_type, VariableType::PopulationCount);
    }

    #[test]
    fn unknown_code_is_unsupported() {
        let err = resolve_variables(&catalog(), &["B99999_001E".to_string()]).unwrap_err();
        assert!(matches!(err, CensusError::UnsupportedVariable { code } if code == "B99999_001E"));
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = catalog();
        let hits = search(&catalog, "income");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "B19013_001E");
        assert_eq!(search(&catalog, "b01001").len(), 1);
    }
}
