use crate::core::error::InputError;
use crate::core::geo::GeoPoint;
use log::warn;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ground elevation assumed when a record carries none.
pub const DEFAULT_ELEVATION_M: f64 = 20.0;

/// Unique identifier for a property in the portfolio.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::core::property::PropertyId;
///
/// let a = PropertyId::new("PROP-001");
/// assert_eq!(a.as_str(), "PROP-001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(String);

impl PropertyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PropertyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Construction class of a property. Drives the damage multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Residential,
    Commercial,
    Industrial,
}

impl PropertyType {
    /// Lenient parse: unknown tags fall back to `Residential` with a warning.
    pub fn parse_or_default(tag: &str) -> Self {
        tag.parse().unwrap_or_else(|_| {
            warn!("unknown property type '{}', defaulting to residential", tag);
            PropertyType::Residential
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Residential => "residential",
            PropertyType::Commercial => "commercial",
            PropertyType::Industrial => "industrial",
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(PropertyType::Residential),
            "commercial" => Ok(PropertyType::Commercial),
            "industrial" => Ok(PropertyType::Industrial),
            other => Err(format!("unknown property type: {other}")),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property exposed to flooding.
///
/// Immutable once built. `new` validates the fields the risk engine cannot
/// work without (identifier, location, market value); optional attributes
/// are set with the `with_*` builders.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::core::property::{Property, PropertyType};
/// use rust_decimal_macros::dec;
///
/// let p = Property::new("PROP-1", 51.5, -0.1, dec!(450000))
///     .unwrap()
///     .with_elevation(12.5)
///     .with_property_type(PropertyType::Commercial);
/// assert_eq!(p.elevation(), 12.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    id: PropertyId,
    location: GeoPoint,
    /// Ground elevation in metres.
    elevation: f64,
    /// Market value.
    value: Decimal,
    /// Height of the lowest habitable floor above ground, metres.
    floor_level: f64,
    property_type: PropertyType,
}

impl Property {
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        value: Decimal,
    ) -> Result<Self, InputError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InputError::EmptyIdentifier { kind: "property" });
        }
        let location = GeoPoint::new(latitude, longitude);
        if !location.is_valid() {
            return Err(InputError::InvalidCoordinates {
                id,
                latitude,
                longitude,
            });
        }
        if value <= Decimal::ZERO {
            return Err(InputError::NotPositive {
                id,
                field: "value",
                value: value.to_string(),
            });
        }
        Ok(Self {
            id: PropertyId::new(id),
            location,
            elevation: DEFAULT_ELEVATION_M,
            value,
            floor_level: 0.0,
            property_type: PropertyType::Residential,
        })
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    /// Set the elevation if one is known; a missing or non-finite value
    /// keeps the default and logs a warning.
    pub fn with_optional_elevation(mut self, elevation: Option<f64>) -> Self {
        match elevation {
            Some(e) if e.is_finite() => self.elevation = e,
            _ => warn!(
                "{}: elevation missing, defaulting to {:.1} m",
                self.id, DEFAULT_ELEVATION_M
            ),
        }
        self
    }

    pub fn with_floor_level(mut self, floor_level: f64) -> Result<Self, InputError> {
        if !floor_level.is_finite() {
            return Err(InputError::NonFinite {
                id: self.id.to_string(),
                field: "floor_level",
                value: floor_level,
            });
        }
        if floor_level < 0.0 {
            return Err(InputError::Negative {
                id: self.id.to_string(),
                field: "floor_level",
                value: floor_level.to_string(),
            });
        }
        self.floor_level = floor_level;
        Ok(self)
    }

    pub fn with_property_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = property_type;
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> &PropertyId {
        &self.id
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Market value as `f64` for the numeric models.
    pub fn value_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    pub fn floor_level(&self) -> f64 {
        self.floor_level
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }
}
