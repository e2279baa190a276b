//! Flood event selection from gauge peaks.
//!
//! Each usable gauge is scored by how close its peak reading came to the
//! severe-warning level and how far it rose above the alert level. The
//! most vulnerable gauges become the centers of the flood event.

use crate::core::error::InputError;
use crate::core::gauge::{GaugeId, GaugeNetwork};
use crate::core::geo::GeoPoint;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Largest peak depth a selected center can carry, metres.
pub const MAX_CENTER_DEPTH_M: f64 = 3.0;

/// One center of a flood event: water peaks at the center and decays
/// linearly to zero at `radius_m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodCenter {
    pub name: String,
    pub location: GeoPoint,
    pub radius_m: f64,
    pub peak_depth_m: f64,
    pub gauge_id: Option<GaugeId>,
    /// Vulnerability score of the originating gauge, in [0, 1].
    pub vulnerability: f64,
}

impl FloodCenter {
    /// Build a center by hand. Radius must be positive, depth non-negative.
    pub fn new(
        name: impl Into<String>,
        location: GeoPoint,
        radius_m: f64,
        peak_depth_m: f64,
    ) -> Result<Self, InputError> {
        let name = name.into();
        if !location.is_valid() {
            return Err(InputError::InvalidCoordinates {
                id: name,
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(InputError::NotPositive {
                id: name,
                field: "radius_m",
                value: radius_m.to_string(),
            });
        }
        if !peak_depth_m.is_finite() || peak_depth_m < 0.0 {
            return Err(InputError::Negative {
                id: name,
                field: "peak_depth_m",
                value: peak_depth_m.to_string(),
            });
        }
        Ok(Self {
            name,
            location,
            radius_m,
            peak_depth_m,
            gauge_id: None,
            vulnerability: 0.0,
        })
    }

    /// Depth this center alone produces at `point`.
    pub fn depth_at(&self, point: &GeoPoint) -> f64 {
        let distance = self.location.planar_distance_m(point);
        if !distance.is_finite() || distance > self.radius_m {
            return 0.0;
        }
        (self.peak_depth_m * (1.0 - distance / self.radius_m)).max(0.0)
    }
}

/// A flood scenario: one or more centers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodEvent {
    pub centers: Vec<FloodCenter>,
    /// True when no gauge qualified and the default center was used.
    pub is_fallback: bool,
}

impl FloodEvent {
    pub fn from_centers(centers: Vec<FloodCenter>) -> Self {
        Self {
            centers,
            is_fallback: false,
        }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn average_peak_depth(&self) -> f64 {
        if self.centers.is_empty() {
            return 0.0;
        }
        self.centers.iter().map(|c| c.peak_depth_m).sum::<f64>() / self.centers.len() as f64
    }

    pub fn max_radius(&self) -> f64 {
        self.centers.iter().map(|c| c.radius_m).fold(0.0, f64::max)
    }
}

/// Per-gauge scoring detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeVulnerability {
    pub gauge_id: GaugeId,
    pub name: String,
    pub location: GeoPoint,
    pub peak_level: f64,
    pub severe_proximity: f64,
    pub alert_exceedance: f64,
    pub score: f64,
}

impl GaugeVulnerability {
    /// Score a single gauge peak against its thresholds.
    ///
    /// A non-positive alert level means the gauge has no alert threshold and
    /// contributes no exceedance.
    pub fn score(peak_level: f64, alert_level: f64, severe_level: f64) -> (f64, f64, f64) {
        let severe_proximity = (peak_level / severe_level).min(1.0);
        let alert_exceedance = if alert_level > 0.0 {
            (peak_level - alert_level).max(0.0)
        } else {
            0.0
        };
        let score = 0.6 * severe_proximity + 0.4 * alert_exceedance;
        (severe_proximity, alert_exceedance, score)
    }
}

/// Tunables for event selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Maximum number of centers.
    pub max_centers: usize,
    /// Gauges must score above this to count towards the center total.
    pub min_vulnerability: f64,
    /// Center used when no gauge can be scored.
    pub fallback_location: GeoPoint,
    pub fallback_radius_m: f64,
    pub fallback_depth_m: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            max_centers: 5,
            min_vulnerability: 0.1,
            fallback_location: GeoPoint::new(51.5074, -0.1278),
            fallback_radius_m: 2000.0,
            fallback_depth_m: 0.5,
        }
    }
}

/// Derives flood centers from the gauge network.
#[derive(Debug, Clone, Default)]
pub struct FloodEventSelector {
    config: EventConfig,
}

impl FloodEventSelector {
    pub fn new(config: EventConfig) -> Self {
        Self { config }
    }

    /// Score every usable gauge, most vulnerable first.
    ///
    /// Gauges without coordinates, without a positive severe level, or
    /// without readings are skipped. Ties keep gauge-id order.
    pub fn rank_gauges(&self, network: &GaugeNetwork) -> Vec<GaugeVulnerability> {
        let mut ranked = Vec::new();
        for gauge in network.gauges() {
            let Some(location) = gauge.location() else {
                debug!("gauge {}: skipped, no location", gauge.id());
                continue;
            };
            let thresholds = gauge.thresholds();
            if !thresholds.has_usable_severe() {
                debug!("gauge {}: skipped, no severe level", gauge.id());
                continue;
            }
            let Some(peak_level) = network.peak_level(gauge.id()) else {
                continue;
            };
            let (severe_proximity, alert_exceedance, score) =
                GaugeVulnerability::score(peak_level, thresholds.alert, thresholds.severe);
            if !score.is_finite() {
                warn!("gauge {}: non-finite vulnerability, skipped", gauge.id());
                continue;
            }
            debug!(
                "gauge {}: peak={:.2} severe={:.2} proximity={:.2} vulnerability={:.3}",
                gauge.id(),
                peak_level,
                thresholds.severe,
                severe_proximity,
                score
            );
            ranked.push(GaugeVulnerability {
                gauge_id: gauge.id().clone(),
                name: gauge.name().to_string(),
                location,
                peak_level,
                severe_proximity,
                alert_exceedance,
                score,
            });
        }
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }

    /// Select the flood event for the network.
    pub fn select(&self, network: &GaugeNetwork) -> FloodEvent {
        let ranked = self.rank_gauges(network);
        if ranked.is_empty() {
            info!("no gauge qualified, using default flood center");
            return self.fallback_event();
        }

        let qualifying = ranked
            .iter()
            .filter(|g| g.score > self.config.min_vulnerability)
            .count();
        let n_centers = qualifying.max(1).min(self.config.max_centers.max(1));

        let centers: Vec<FloodCenter> = ranked
            .into_iter()
            .take(n_centers)
            .map(|g| Self::center_from_gauge(&g))
            .collect();

        let event = FloodEvent::from_centers(centers);
        for c in &event.centers {
            debug!(
                "flood center {} at {}: radius={:.0}m depth={:.2}m vulnerability={:.3}",
                c.name, c.location, c.radius_m, c.peak_depth_m, c.vulnerability
            );
        }
        info!(
            "flood event: {} centers, average depth {:.2}m, max radius {:.0}m",
            event.len(),
            event.average_peak_depth(),
            event.max_radius()
        );
        event
    }

    /// Radius and depth grow with vulnerability; exceedance above the
    /// alert level adds up to one extra metre.
    pub fn center_from_gauge(g: &GaugeVulnerability) -> FloodCenter {
        let vulnerability = g.score.clamp(0.0, 1.0);
        let radius_m = 1000.0 + 4000.0 * vulnerability;
        let base_depth = 0.2 + 1.8 * vulnerability;
        let exceedance_depth = (0.5 * g.alert_exceedance).min(1.0);
        let peak_depth_m = (base_depth + exceedance_depth).min(MAX_CENTER_DEPTH_M);
        FloodCenter {
            name: g.name.clone(),
            location: g.location,
            radius_m,
            peak_depth_m,
            gauge_id: Some(g.gauge_id.clone()),
            vulnerability,
        }
    }

    fn fallback_event(&self) -> FloodEvent {
        FloodEvent {
            centers: vec![FloodCenter {
                name: "Default".to_string(),
                location: self.config.fallback_location,
                radius_m: self.config.fallback_radius_m,
                peak_depth_m: self.config.fallback_depth_m,
                gauge_id: None,
                vulnerability: 0.0,
            }],
            is_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gauge::{FloodThresholds, Gauge, GaugeReading};
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn network_with(levels: &[(&str, f64, f64, f64)]) -> GaugeNetwork {
        // (id, peak, alert, severe)
        let mut net = GaugeNetwork::new();
        for (i, (id, peak, alert, severe)) in levels.iter().enumerate() {
            let g = Gauge::new(
                *id,
                Some(GeoPoint::new(51.5 + i as f64 * 0.01, -0.1)),
                5.0,
                FloodThresholds::new(*alert, (*alert + *severe) / 2.0, *severe),
            )
            .unwrap();
            net.add_gauge(g);
            let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
            net.add_reading(GaugeReading::new(*id, t, *peak));
        }
        net
    }

    #[test]
    fn test_vulnerability_formula() {
        let (prox, exc, score) = GaugeVulnerability::score(1.5, 1.0, 2.0);
        assert_relative_eq!(prox, 0.75);
        assert_relative_eq!(exc, 0.5);
        assert_relative_eq!(score, 0.6 * 0.75 + 0.4 * 0.5);
    }

    #[test]
    fn test_proximity_capped_at_one() {
        let (prox, _, _) = GaugeVulnerability::score(5.0, 1.0, 2.0);
        assert_eq!(prox, 1.0);
    }

    #[test]
    fn test_center_parameters() {
        let g = GaugeVulnerability {
            gauge_id: GaugeId::new("G"),
            name: "G".into(),
            location: GeoPoint::new(51.5, -0.1),
            peak_level: 1.5,
            severe_proximity: 0.75,
            alert_exceedance: 0.5,
            score: 0.5,
        };
        let c = FloodEventSelector::center_from_gauge(&g);
        assert_relative_eq!(c.radius_m, 3000.0);
        assert_relative_eq!(c.peak_depth_m, 0.2 + 0.9 + 0.25);
    }

    #[test]
    fn test_depth_capped_at_three_metres() {
        let g = GaugeVulnerability {
            gauge_id: GaugeId::new("G"),
            name: "G".into(),
            location: GeoPoint::new(51.5, -0.1),
            peak_level: 10.0,
            severe_proximity: 1.0,
            alert_exceedance: 9.0,
            score: 4.2,
        };
        let c = FloodEventSelector::center_from_gauge(&g);
        assert_eq!(c.peak_depth_m, MAX_CENTER_DEPTH_M);
        assert_eq!(c.vulnerability, 1.0);
        assert_relative_eq!(c.radius_m, 5000.0);
    }

    #[test]
    fn test_empty_network_falls_back() {
        let event = FloodEventSelector::default().select(&GaugeNetwork::new());
        assert!(event.is_fallback);
        assert_eq!(event.len(), 1);
        assert_eq!(event.centers[0].radius_m, 2000.0);
        assert_eq!(event.centers[0].peak_depth_m, 0.5);
    }

    #[test]
    fn test_selects_at_most_five_centers() {
        let levels: Vec<(String, f64, f64, f64)> = (0..8)
            .map(|i| (format!("G{i}"), 1.8, 1.0, 2.0))
            .collect();
        let refs: Vec<(&str, f64, f64, f64)> = levels
            .iter()
            .map(|(id, a, b, c)| (id.as_str(), *a, *b, *c))
            .collect();
        let event = FloodEventSelector::default().select(&network_with(&refs));
        assert_eq!(event.len(), 5);
        assert!(!event.is_fallback);
    }

    #[test]
    fn test_selects_one_center_when_nothing_qualifies() {
        let event = FloodEventSelector::default()
            .select(&network_with(&[("A", 0.05, 1.0, 2.0), ("B", 0.1, 1.0, 2.0)]));
        assert_eq!(event.len(), 1);
        assert_eq!(event.centers[0].gauge_id, Some(GaugeId::new("B")));
    }

    #[test]
    fn test_ranking_is_descending() {
        let selector = FloodEventSelector::default();
        let ranked =
            selector.rank_gauges(&network_with(&[("A", 0.5, 1.0, 2.0), ("B", 1.9, 1.0, 2.0)]));
        assert_eq!(ranked[0].gauge_id, GaugeId::new("B"));
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_gauge_without_severe_level_skipped() {
        let ranked = FloodEventSelector::default()
            .rank_gauges(&network_with(&[("A", 1.5, 1.0, 0.0)]));
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_center_depth_decay() {
        let c = FloodCenter::new("C", GeoPoint::new(51.5, -0.1), 2000.0, 0.5).unwrap();
        assert_eq!(c.depth_at(&GeoPoint::new(51.5, -0.1)), 0.5);
        assert_eq!(c.depth_at(&GeoPoint::new(51.5, -0.1 + 2500.0 / 111_000.0)), 0.0);
    }

    #[test]
    fn test_center_rejects_zero_radius() {
        assert!(FloodCenter::new("C", GeoPoint::new(51.5, -0.1), 0.0, 0.5).is_err());
    }
}
