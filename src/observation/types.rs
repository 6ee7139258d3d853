//! Observation record types.
//!
//! Mirrors the shape of crowd-sourced sighting records as delivered by the
//! upstream fetch stage. Fields the curation core never reads are kept in
//! `extra` so that selected records serialize back out unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Quality score assumed for observations that were never scored.
pub const DEFAULT_QUALITY_SCORE: f64 = 50.0;

/// Species name reported when the taxon carries no name.
pub const UNKNOWN_SPECIES_NAME: &str = "Unknown";

/// Opaque observation identifier (numeric or textual).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationId {
    /// Numeric identifier, the common case.
    Number(i64),
    /// Any other identifier.
    Text(String),
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationId::Number(id) => write!(f, "{}", id),
            ObservationId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for ObservationId {
    fn from(id: i64) -> Self {
        ObservationId::Number(id)
    }
}

impl From<&str> for ObservationId {
    fn from(id: &str) -> Self {
        ObservationId::Text(id.to_string())
    }
}

/// Taxon the observation was identified as.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    /// Species identifier used to partition the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Scientific name of the species.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pixel dimensions of the original upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

/// A photo attached to an observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_dimensions: Option<PhotoDimensions>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single reported wildlife sighting.
///
/// Coordinates may arrive in three shapes (direct `latitude`/`longitude`,
/// a GeoJSON point, or a `"lat,lon"` location string), so they are kept as
/// raw JSON values and resolved by [`crate::observation::extract_coordinates`].
/// Malformed geodata never fails deserialization; the record just ends up
/// without coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Identifier assigned by the observation source.
    pub id: ObservationId,

    /// Identified taxon; records without a taxon id are not curated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon: Option<Taxon>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Value>,

    /// GeoJSON point, coordinates ordered `[lon, lat]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,

    /// Observation date, `YYYY-MM-DD` with an optional time suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_on: Option<String>,

    /// Image quality score produced by the external assessment stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub photos: Vec<Photo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faves_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u64>,

    /// Remaining source fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Observation {
    /// Creates a bare observation with only an identifier.
    pub fn new(id: impl Into<ObservationId>) -> Self {
        Self {
            id: id.into(),
            taxon: None,
            latitude: None,
            longitude: None,
            geojson: None,
            location: None,
            observed_on: None,
            quality_score: None,
            photos: Vec::new(),
            faves_count: None,
            comments_count: None,
            extra: Map::new(),
        }
    }

    /// Sets the taxon id and name.
    pub fn with_species(mut self, species_id: i64, name: impl Into<String>) -> Self {
        self.taxon = Some(Taxon {
            id: Some(species_id),
            name: Some(name.into()),
            extra: Map::new(),
        });
        self
    }

    /// Sets direct latitude/longitude fields.
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(Value::from(latitude));
        self.longitude = Some(Value::from(longitude));
        self
    }

    /// Sets the observation date.
    pub fn with_observed_on(mut self, observed_on: impl Into<String>) -> Self {
        self.observed_on = Some(observed_on.into());
        self
    }

    /// Sets the quality score.
    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    /// Appends a photo with known original dimensions.
    pub fn with_photo(mut self, width: u64, height: u64) -> Self {
        self.photos.push(Photo {
            original_dimensions: Some(PhotoDimensions {
                width: Some(width),
                height: Some(height),
            }),
            ..Photo::default()
        });
        self
    }

    /// Sets engagement counters.
    pub fn with_engagement(mut self, faves: u64, comments: u64) -> Self {
        self.faves_count = Some(faves);
        self.comments_count = Some(comments);
        self
    }

    /// Species identifier, if the record was identified.
    pub fn species_id(&self) -> Option<i64> {
        self.taxon.as_ref().and_then(|t| t.id)
    }

    /// Species name, or `"Unknown"`.
    pub fn species_name(&self) -> &str {
        self.taxon
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or(UNKNOWN_SPECIES_NAME)
    }

    /// Quality score, defaulting to 50 when the record was never scored.
    pub fn quality(&self) -> f64 {
        self.quality_score.unwrap_or(DEFAULT_QUALITY_SCORE)
    }

    /// Favourites plus comments.
    pub fn engagement(&self) -> u64 {
        self.faves_count
            .unwrap_or(0)
            .saturating_add(self.comments_count.unwrap_or(0))
    }

    /// The first photo, which is the one downstream stages download.
    pub fn primary_photo(&self) -> Option<&Photo> {
        self.photos.first()
    }
}

/// Reads an explicit `null` as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
