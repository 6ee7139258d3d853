//! Geo/temporal feature extraction shared by deduplication and selection.
//!
//! Two day-of-year approximations coexist on purpose: deduplication uses the
//! calendar ordinal, selection uses `(month - 1) * 30 + day`. They feed
//! different distance metrics and must not be unified.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use super::types::Observation;

/// Day of year used when an observation has no usable date (roughly mid-year).
pub const DEFAULT_DAY_OF_YEAR: u32 = 182;

/// Month used by stratification when the date carries none.
pub const DEFAULT_MONTH: u32 = 6;

/// Day of month assumed when a date has only year and month.
const DEFAULT_DAY_OF_MONTH: i64 = 15;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both values finite and within `[-90, 90]` / `[-180, 180]`.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Extracts coordinates from an observation.
///
/// Sources are tried in order and the first that yields two numbers wins:
///
/// 1. direct `latitude` / `longitude` fields (numbers or numeric strings)
/// 2. `geojson.coordinates`, ordered `[lon, lat]`
/// 3. a `location` string of the form `"lat,lon"`
///
/// The result is not range-checked; see [`valid_coordinates`].
pub fn extract_coordinates(observation: &Observation) -> Option<Coordinates> {
    if let (Some(lat), Some(lon)) = (&observation.latitude, &observation.longitude) {
        if let (Some(lat), Some(lon)) = (value_to_f64(lat), value_to_f64(lon)) {
            return Some(Coordinates::new(lat, lon));
        }
    }

    let point = observation
        .geojson
        .as_ref()
        .and_then(|geojson| geojson.get("coordinates"))
        .and_then(Value::as_array);
    if let Some([lon, lat, ..]) = point.map(Vec::as_slice) {
        if let (Some(lat), Some(lon)) = (value_to_f64(lat), value_to_f64(lon)) {
            return Some(Coordinates::new(lat, lon));
        }
    }

    if let Some(Value::String(location)) = &observation.location {
        let mut parts = location.split(',');
        if let (Some(lat), Some(lon)) = (parts.next(), parts.next()) {
            if let (Ok(lat), Ok(lon)) = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
                return Some(Coordinates::new(lat, lon));
            }
        }
    }

    None
}

/// Extracts coordinates and keeps them only when they pass [`Coordinates::is_valid`].
pub fn valid_coordinates(observation: &Observation) -> Option<Coordinates> {
    extract_coordinates(observation).filter(Coordinates::is_valid)
}

/// Returns true if the observation carries valid coordinates.
pub fn has_valid_coordinates(observation: &Observation) -> bool {
    valid_coordinates(observation).is_some()
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Strips a time-of-day suffix (`2023-06-15T10:20:00Z` -> `2023-06-15`).
fn date_part(observed_on: &str) -> &str {
    let trimmed = observed_on.trim();
    trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed)
}

/// Parses the calendar date of `observed_on`, ignoring any time suffix.
pub fn parse_observed_date(observed_on: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_part(observed_on), "%Y-%m-%d").ok()
}

/// Calendar day of year (1-366), or 182 for missing or unparseable dates.
///
/// Used by deduplication.
pub fn calendar_day_of_year(observed_on: Option<&str>) -> u32 {
    observed_on
        .and_then(parse_observed_date)
        .map(|date| date.ordinal())
        .unwrap_or(DEFAULT_DAY_OF_YEAR)
}

/// Coarse day of year `(month - 1) * 30 + day`, or 182 on failure.
///
/// Used by the selection feature space. A `YYYY-MM` date counts as the 15th.
pub fn approximate_day_of_year(observed_on: Option<&str>) -> i64 {
    let Some(observed_on) = observed_on.filter(|s| !s.trim().is_empty()) else {
        return DEFAULT_DAY_OF_YEAR as i64;
    };

    let parts: Vec<&str> = date_part(observed_on).split('-').collect();
    if parts.len() < 2 {
        return DEFAULT_DAY_OF_YEAR as i64;
    }

    let month = match parts[1].parse::<i64>() {
        Ok(month) => month,
        Err(_) => return DEFAULT_DAY_OF_YEAR as i64,
    };
    let day = match parts.get(2) {
        Some(day) => match day.parse::<i64>() {
            Ok(day) => day,
            Err(_) => return DEFAULT_DAY_OF_YEAR as i64,
        },
        None => DEFAULT_DAY_OF_MONTH,
    };

    (month - 1) * 30 + day
}

/// Month number of `observed_on`, or 6 when absent or unparseable.
pub fn observation_month(observed_on: Option<&str>) -> u32 {
    observed_on
        .and_then(|s| date_part(s).split('-').nth(1)?.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MONTH)
}

/// Deduplication feature `(lat, lon, calendar_day_of_year)`.
///
/// Returns `None` for observations without valid coordinates.
pub fn spatiotemporal_features(observation: &Observation) -> Option<[f64; 3]> {
    let coords = valid_coordinates(observation)?;
    let day = calendar_day_of_year(observation.observed_on.as_deref());
    Some([coords.latitude, coords.longitude, day as f64])
}

/// Selection feature `(lat, lon, approximate_day_of_year, quality)`.
///
/// Returns `None` for observations without valid coordinates.
pub fn selection_features(observation: &Observation) -> Option<[f64; 4]> {
    let coords = valid_coordinates(observation)?;
    let day = approximate_day_of_year(observation.observed_on.as_deref());
    Some([
        coords.latitude,
        coords.longitude,
        day as f64,
        observation.quality(),
    ])
}
