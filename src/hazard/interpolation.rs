//! Flood depth at property locations.
//!
//! Two strategies sit behind [`FloodDepthInterpolator`]:
//!
//! - **Radial decay** from the centers of a [`FloodEvent`]. Centers combine
//!   by taking the deepest, never by summation.
//! - **Inverse-distance-weighted water surface elevation** from gauge
//!   readings: gauge WSE is interpolated with `1/d²` weights and the
//!   property's ground elevation is subtracted.
//!
//! Both clamp to non-negative depths and never produce NaN.

use crate::core::gauge::{GaugeId, GaugeNetwork};
use crate::core::geo::GeoPoint;
use crate::core::property::Property;
use crate::hazard::event::FloodEvent;
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Properties closer than this to a gauge take its WSE exactly, metres.
pub const SNAP_DISTANCE_M: f64 = 1.0;

/// Which interpolation strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationStrategy {
    #[default]
    RadialDecay,
    InverseDistanceWse,
}

/// Damping applied to IDW depths far from every gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FarGaugeDamping {
    pub max_distance_m: f64,
    pub uncertainty_factor: f64,
}

impl Default for FarGaugeDamping {
    fn default() -> Self {
        Self {
            max_distance_m: 10_000.0,
            uncertainty_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub strategy: InterpolationStrategy,
    /// `None` disables damping.
    pub far_gauge_damping: Option<FarGaugeDamping>,
}

/// A gauge reduced to what IDW needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WseStation {
    pub gauge_id: GaugeId,
    pub location: GeoPoint,
    /// Water surface elevation: depth reading plus gauge ground elevation.
    pub wse: f64,
}

/// Water-surface field sampled at gauges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WseField {
    stations: Vec<WseStation>,
    damping: Option<FarGaugeDamping>,
}

impl WseField {
    pub fn new(stations: Vec<WseStation>) -> Self {
        Self {
            stations,
            damping: None,
        }
    }

    /// Use each gauge's peak reading as its depth.
    pub fn from_peak_levels(network: &GaugeNetwork) -> Self {
        let depths: HashMap<GaugeId, f64> = network
            .gauges()
            .filter_map(|g| network.peak_level(g.id()).map(|p| (g.id().clone(), p)))
            .collect();
        Self::from_depths(network, &depths)
    }

    /// Build from explicit per-gauge depth readings. Gauges that are unknown,
    /// unlocated or carry non-finite values are skipped.
    pub fn from_depths(network: &GaugeNetwork, depths: &HashMap<GaugeId, f64>) -> Self {
        let mut ids: Vec<&GaugeId> = depths.keys().collect();
        ids.sort();
        let stations = ids
            .into_iter()
            .filter_map(|id| {
                let gauge = match network.gauge(id) {
                    Some(g) => g,
                    None => {
                        warn!("depth reading for unknown gauge {}, skipped", id);
                        return None;
                    }
                };
                let location = gauge.location()?;
                let wse = depths[id] + gauge.elevation();
                wse.is_finite().then(|| WseStation {
                    gauge_id: id.clone(),
                    location,
                    wse,
                })
            })
            .collect();
        Self::new(stations)
    }

    pub fn with_damping(mut self, damping: Option<FarGaugeDamping>) -> Self {
        self.damping = damping;
        self
    }

    pub fn stations(&self) -> &[WseStation] {
        &self.stations
    }

    /// Interpolated water surface elevation at `point`, or `None` when no
    /// station carries weight there.
    pub fn wse_at(&self, point: &GeoPoint) -> Option<f64> {
        let mut distances = Vec::with_capacity(self.stations.len());
        for station in &self.stations {
            let d = station.location.planar_distance_m(point);
            if !d.is_finite() {
                continue;
            }
            if d < SNAP_DISTANCE_M {
                return Some(station.wse);
            }
            distances.push((d, station.wse));
        }

        let (weighted, total) = distances
            .iter()
            .fold((0.0, 0.0), |(weighted, total), (d, wse)| {
                let w = 1.0 / (d * d);
                (weighted + w * wse, total + w)
            });
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        let wse = weighted / total;
        wse.is_finite().then_some(wse)
    }

    fn nearest_distance_m(&self, point: &GeoPoint) -> Option<f64> {
        self.stations
            .iter()
            .map(|s| s.location.planar_distance_m(point))
            .filter(|d| d.is_finite())
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Depth of water above `ground_elevation` at `point`.
    pub fn depth_at(&self, point: &GeoPoint, ground_elevation: f64) -> f64 {
        let Some(wse) = self.wse_at(point) else {
            return 0.0;
        };
        let mut depth = (wse - ground_elevation).max(0.0);
        if let Some(damping) = self.damping {
            if let Some(nearest) = self.nearest_distance_m(point) {
                if nearest > damping.max_distance_m {
                    warn!(
                        "point {} is {:.0}m from the nearest gauge, damping depth",
                        point, nearest
                    );
                    depth *= damping.uncertainty_factor;
                }
            }
        }
        if depth.is_finite() {
            depth
        } else {
            0.0
        }
    }
}

/// Maps property locations to flood depth using one of two strategies.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::core::geo::GeoPoint;
/// use flood_risk_engine::core::property::Property;
/// use flood_risk_engine::hazard::event::{FloodCenter, FloodEvent};
/// use flood_risk_engine::hazard::interpolation::FloodDepthInterpolator;
/// use rust_decimal_macros::dec;
///
/// let center = FloodCenter::new("C", GeoPoint::new(51.5, -0.1), 2000.0, 0.5).unwrap();
/// let interp = FloodDepthInterpolator::RadialDecay(FloodEvent::from_centers(vec![center]));
/// let at_center = Property::new("P", 51.5, -0.1, dec!(100000)).unwrap();
/// assert_eq!(interp.depth_at(&at_center), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FloodDepthInterpolator {
    RadialDecay(FloodEvent),
    InverseDistanceWse(WseField),
}

impl FloodDepthInterpolator {
    /// Pick the configured strategy for a network and its selected event.
    pub fn for_strategy(
        config: &InterpolationConfig,
        network: &GaugeNetwork,
        event: &FloodEvent,
    ) -> Self {
        match config.strategy {
            InterpolationStrategy::RadialDecay => Self::RadialDecay(event.clone()),
            InterpolationStrategy::InverseDistanceWse => Self::InverseDistanceWse(
                WseField::from_peak_levels(network).with_damping(config.far_gauge_damping),
            ),
        }
    }

    pub fn strategy(&self) -> InterpolationStrategy {
        match self {
            Self::RadialDecay(_) => InterpolationStrategy::RadialDecay,
            Self::InverseDistanceWse(_) => InterpolationStrategy::InverseDistanceWse,
        }
    }

    /// Flood depth at one property, metres, never negative.
    pub fn depth_at(&self, property: &Property) -> f64 {
        let point = property.location();
        let depth = match self {
            Self::RadialDecay(event) => event
                .centers
                .iter()
                .map(|c| c.depth_at(&point))
                .fold(0.0, f64::max),
            Self::InverseDistanceWse(field) => field.depth_at(&point, property.elevation()),
        };
        if depth.is_finite() {
            depth.max(0.0)
        } else {
            0.0
        }
    }

    /// Depths for a whole portfolio, in input order.
    pub fn depths(&self, properties: &[Property]) -> Vec<f64> {
        properties.par_iter().map(|p| self.depth_at(p)).collect()
    }
}
