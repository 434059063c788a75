//! Census tract GEOID helpers.
//!
//! A tract GEOID is 11 digits: a two-digit state FIPS code, a three-digit
//! county FIPS code and a six-digit tract code (e.g. `17` `031` `081500`).

/// Length of a full tract GEOID.
pub const TRACT_GEOID_LEN: usize = 11;

/// Derive the state FIPS code from a GEOID (first 2 characters).
#[must_use]
pub fn state_fips(geoid: &str) -> Option<&str> {
    geoid.get(..2)
}

/// Derive the county FIPS code from a tract GEOID (characters 3-5).
#[must_use]
pub fn county_fips(geoid: &str) -> Option<&str> {
    geoid.get(2..5)
}

/// Derive the six-digit tract code from a tract GEOID.
#[must_use]
pub fn tract_code(geoid: &str) -> Option<&str> {
    if geoid.len() == TRACT_GEOID_LEN {
        geoid.get(5..)
    } else {
        None
    }
}

/// Builds a tract GEOID from its state, county and tract parts.
#[must_use]
pub fn tract_geoid(state: &str, county: &str, tract: &str) -> String {
    format!("{state}{county}{tract}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tract_geoid() {
        let geoid = "17031081500";
        assert_eq!(state_fips(geoid), Some("17"));
        assert_eq!(county_fips(geoid), Some("031"));
        assert_eq!(tract_code(geoid), Some("081500"));
        assert_eq!(tract_geoid("17", "031", "081500"), geoid);
    }

    #[test]
    fn short_geoids() {
        assert_eq!(state_fips("1"), None);
        assert_eq!(county_fips("17"), None);
        assert_eq!(tract_code("17031"), None);
    }
}
