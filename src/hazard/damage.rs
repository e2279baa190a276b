//! Depth-damage (vulnerability) curve.

use crate::core::property::{Property, PropertyType};
use serde::{Deserialize, Serialize};

/// Control points `(depth m, damage ratio)` of the standard curve.
const STANDARD_CURVE: [(f64, f64); 10] = [
    (0.0, 0.0),
    (0.05, 0.05),
    (0.5, 0.25),
    (1.0, 0.4),
    (1.5, 0.5),
    (2.0, 0.6),
    (3.0, 0.75),
    (4.0, 0.85),
    (5.0, 0.95),
    (6.0, 1.0),
];

/// Monotone piecewise-linear map from flood depth to damage ratio.
///
/// Depths below the first control point map to 0, above the last to 1.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::hazard::damage::DepthDamageFunction;
///
/// let f = DepthDamageFunction::default();
/// assert_eq!(f.base_ratio(1.0), 0.4);
/// assert!((f.base_ratio(0.75) - 0.325).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthDamageFunction {
    points: Vec<(f64, f64)>,
}

impl Default for DepthDamageFunction {
    fn default() -> Self {
        Self {
            points: STANDARD_CURVE.to_vec(),
        }
    }
}

impl DepthDamageFunction {
    /// Damage multiplier for a construction class.
    pub fn type_multiplier(property_type: PropertyType) -> f64 {
        match property_type {
            PropertyType::Residential => 1.0,
            PropertyType::Commercial => 1.2,
            PropertyType::Industrial => 0.9,
        }
    }

    /// Curve value at `depth`, before any property adjustment.
    pub fn base_ratio(&self, depth: f64) -> f64 {
        if !depth.is_finite() {
            return if depth == f64::INFINITY { 1.0 } else { 0.0 };
        }
        let (first_x, _) = self.points[0];
        let (last_x, _) = self.points[self.points.len() - 1];
        if depth < first_x {
            return 0.0;
        }
        if depth > last_x {
            return 1.0;
        }
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if depth <= x1 {
                if depth == x1 {
                    return y1;
                }
                return y0 + (y1 - y0) * (depth - x0) / (x1 - x0);
            }
        }
        1.0
    }

    /// Damage ratio for a property flooded to `depth`.
    ///
    /// Only water above the property's raised floor does damage. The result
    /// is clipped to [0, 1].
    pub fn impact_ratio(&self, depth: f64, property: &Property) -> f64 {
        self.impact_ratio_for(depth, property.floor_level(), property.property_type())
    }

    pub fn impact_ratio_for(&self, depth: f64, floor_level: f64, property_type: PropertyType) -> f64 {
        let effective_depth = (depth - floor_level).max(0.0);
        let ratio = Self::type_multiplier(property_type) * self.base_ratio(effective_depth);
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Ratios for a portfolio, pairing `depths[i]` with `properties[i]`.
    pub fn impact_ratios(&self, depths: &[f64], properties: &[Property]) -> Vec<f64> {
        depths
            .iter()
            .zip(properties)
            .map(|(depth, property)| self.impact_ratio(*depth, property))
            .collect()
    }
}
