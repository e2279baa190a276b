use crate::core::error::InputError;
use crate::core::geo::GeoPoint;
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a water-level gauge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GaugeId(String);

impl GaugeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GaugeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GaugeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Alert / warning / severe-warning water levels of a gauge, in metres of
/// stage above the gauge datum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FloodThresholds {
    pub alert: f64,
    pub warning: f64,
    pub severe: f64,
}

impl FloodThresholds {
    pub fn new(alert: f64, warning: f64, severe: f64) -> Self {
        Self {
            alert,
            warning,
            severe,
        }
    }

    /// A gauge can only be scored when its severe level is a positive number.
    pub fn has_usable_severe(&self) -> bool {
        self.severe.is_finite() && self.severe > 0.0
    }
}

/// Read-only reference data for one gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    id: GaugeId,
    name: String,
    /// `None` when the source record carried no usable coordinates.
    location: Option<GeoPoint>,
    /// Ground elevation at the gauge, metres.
    elevation: f64,
    thresholds: FloodThresholds,
    historical_high: Option<f64>,
    historical_high_date: Option<NaiveDate>,
}

impl Gauge {
    pub fn new(
        id: impl Into<String>,
        location: Option<GeoPoint>,
        elevation: f64,
        thresholds: FloodThresholds,
    ) -> Result<Self, InputError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InputError::EmptyIdentifier { kind: "gauge" });
        }
        if !elevation.is_finite() {
            return Err(InputError::NonFinite {
                id,
                field: "elevation",
                value: elevation,
            });
        }
        let location = match location {
            Some(point) if point.is_valid() => Some(point),
            Some(point) => {
                warn!("gauge {}: invalid coordinates {}, ignoring location", id, point);
                None
            }
            None => {
                warn!("gauge {}: no coordinates", id);
                None
            }
        };
        Ok(Self {
            name: id.clone(),
            id: GaugeId::new(id),
            location,
            elevation,
            thresholds,
            historical_high: None,
            historical_high_date: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_historical_high(mut self, level: f64, date: Option<NaiveDate>) -> Self {
        self.historical_high = Some(level);
        self.historical_high_date = date;
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> &GaugeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn thresholds(&self) -> &FloodThresholds {
        &self.thresholds
    }

    pub fn historical_high(&self) -> Option<f64> {
        self.historical_high
    }

    pub fn historical_high_date(&self) -> Option<NaiveDate> {
        self.historical_high_date
    }
}

/// A single time-stamped water-level observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub gauge_id: GaugeId,
    pub timestamp: DateTime<Utc>,
    /// Stage in metres above the gauge datum.
    pub water_level: f64,
}

impl GaugeReading {
    pub fn new(gauge_id: impl Into<String>, timestamp: DateTime<Utc>, water_level: f64) -> Self {
        Self {
            gauge_id: GaugeId::new(gauge_id),
            timestamp,
            water_level,
        }
    }
}

/// Gauges plus their reading histories, kept time-ascending per gauge.
///
/// The maximum reading over the horizon is the gauge's operative event
/// level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaugeNetwork {
    gauges: BTreeMap<GaugeId, Gauge>,
    readings: BTreeMap<GaugeId, Vec<GaugeReading>>,
}

impl GaugeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_gauge(&mut self, gauge: Gauge) {
        self.gauges.insert(gauge.id().clone(), gauge);
    }

    /// Insert a reading, keeping the gauge's sequence sorted by timestamp.
    /// Non-finite levels are dropped.
    pub fn add_reading(&mut self, reading: GaugeReading) {
        if !reading.water_level.is_finite() {
            warn!(
                "gauge {}: dropping non-finite reading at {}",
                reading.gauge_id, reading.timestamp
            );
            return;
        }
        let series = self.readings.entry(reading.gauge_id.clone()).or_default();
        let pos = series.partition_point(|r| r.timestamp <= reading.timestamp);
        series.insert(pos, reading);
    }

    pub fn gauge(&self, id: &GaugeId) -> Option<&Gauge> {
        self.gauges.get(id)
    }

    /// Gauges in identifier order.
    pub fn gauges(&self) -> impl Iterator<Item = &Gauge> {
        self.gauges.values()
    }

    pub fn readings(&self, id: &GaugeId) -> &[GaugeReading] {
        self.readings.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Maximum water level observed at a gauge, if it has readings.
    pub fn peak_level(&self, id: &GaugeId) -> Option<f64> {
        self.readings(id)
            .iter()
            .map(|r| r.water_level)
            .fold(None, |acc, level| match acc {
                Some(max) if max >= level => Some(max),
                _ => Some(level),
            })
    }

    pub fn gauge_count(&self) -> usize {
        self.gauges.len()
    }

    /// Number of known gauges that have at least one reading.
    pub fn gauges_with_readings(&self) -> usize {
        self.gauges
            .keys()
            .filter(|id| !self.readings(id).is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }
}
