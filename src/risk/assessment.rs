//! Per-property risk records and the portfolio statistics built from them.

use crate::core::property::{Property, PropertyId, PropertyType};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact ratio above which a property counts as "at risk".
pub const AT_RISK_THRESHOLD: f64 = 0.1;

/// Label derived by thresholding the impact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_impact(impact: f64) -> Self {
        if impact > 0.6 {
            RiskLevel::High
        } else if impact > 0.3 {
            RiskLevel::Medium
        } else if impact > AT_RISK_THRESHOLD {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "Minimal",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flood assessment of one property for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRisk {
    pub property_id: PropertyId,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub property_type: PropertyType,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    pub flood_depth_m: f64,
    pub impact_ratio: f64,
    pub value_at_risk: f64,
    pub risk_level: RiskLevel,
}

impl PropertyRisk {
    pub fn new(property: &Property, flood_depth_m: f64, impact_ratio: f64) -> Self {
        let loc = property.location();
        Self {
            property_id: property.id().clone(),
            latitude: loc.latitude,
            longitude: loc.longitude,
            elevation_m: property.elevation(),
            property_type: property.property_type(),
            value: property.value(),
            flood_depth_m,
            impact_ratio,
            value_at_risk: property.value_f64() * impact_ratio,
            risk_level: RiskLevel::from_impact(impact_ratio),
        }
    }

    /// Pair each property with its depth and impact ratio.
    pub fn assess_all(properties: &[Property], depths: &[f64], impacts: &[f64]) -> Vec<Self> {
        properties
            .iter()
            .zip(depths)
            .zip(impacts)
            .map(|((p, d), i)| Self::new(p, *d, *i))
            .collect()
    }

    pub fn is_at_risk(&self) -> bool {
        self.impact_ratio > AT_RISK_THRESHOLD
    }

    pub fn is_flooded(&self) -> bool {
        self.flood_depth_m > 0.0
    }

    /// Value at risk as an exact decimal, rounded to pennies.
    pub fn value_at_risk_decimal(&self) -> Decimal {
        let ratio = Decimal::from_f64(self.impact_ratio).unwrap_or_default();
        (self.value * ratio).round_dp(2)
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Headline portfolio statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_properties: usize,
    pub properties_at_risk: usize,
    pub percentage_at_risk: f64,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub value_at_risk: Decimal,
    pub percentage_value_at_risk: f64,
    pub average_flood_depth_m: f64,
    pub max_flood_depth_m: f64,
    pub average_impact_ratio: f64,
}

impl PortfolioSummary {
    pub fn from_risks(risks: &[PropertyRisk]) -> Self {
        if risks.is_empty() {
            return Self::default();
        }
        let total_value: Decimal = risks.iter().map(|r| r.value).sum();
        let value_at_risk: Decimal = risks.iter().map(PropertyRisk::value_at_risk_decimal).sum();
        let at_risk = risks.iter().filter(|r| r.is_at_risk()).count();

        Self {
            total_properties: risks.len(),
            properties_at_risk: at_risk,
            percentage_at_risk: percentage(at_risk as f64, risks.len() as f64),
            total_value,
            value_at_risk,
            percentage_value_at_risk: percentage(
                value_at_risk.to_f64().unwrap_or(0.0),
                total_value.to_f64().unwrap_or(0.0),
            ),
            average_flood_depth_m: mean(risks.iter().map(|r| r.flood_depth_m)),
            max_flood_depth_m: risks.iter().map(|r| r.flood_depth_m).fold(0.0, f64::max),
            average_impact_ratio: mean(risks.iter().map(|r| r.impact_ratio)),
        }
    }
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Portfolio Flood Summary ===")?;
        writeln!(
            f,
            "  Properties at risk: {}/{} ({:.1}%)",
            self.properties_at_risk, self.total_properties, self.percentage_at_risk
        )?;
        writeln!(
            f,
            "  Value at risk: {} of {} ({:.1}%)",
            self.value_at_risk, self.total_value, self.percentage_value_at_risk
        )?;
        writeln!(f, "  Average flood depth: {:.2} m", self.average_flood_depth_m)?;
        writeln!(f, "  Maximum flood depth: {:.2} m", self.max_flood_depth_m)?;
        writeln!(f, "  Average impact ratio: {:.3}", self.average_impact_ratio)
    }
}

/// Herfindahl-Hirschman index of a set of non-negative amounts.
pub fn herfindahl(values: &[f64]) -> f64 {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    values.iter().map(|v| (v / total).powi(2)).sum()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub total_portfolio_value: f64,
    /// Value of properties with any damage at all.
    pub exposed_value: f64,
    pub expected_loss: f64,
    pub expected_loss_ratio: f64,
    pub max_single_property_loss: f64,
    /// HHI of per-property expected losses.
    pub loss_concentration_hhi: f64,
    /// HHI of per-cell value at risk.
    pub geographic_concentration_hhi: f64,
    pub high_risk_properties: usize,
    pub medium_risk_properties: usize,
    pub low_risk_properties: usize,
    pub properties_with_flooding: usize,
    pub percentage_flooded: f64,
}

impl AdvancedMetrics {
    pub fn compute(risks: &[PropertyRisk], geographic_concentration_hhi: f64) -> Self {
        let losses: Vec<f64> = risks.iter().map(|r| r.value_at_risk).collect();
        let total: f64 = risks.iter().map(|r| r.value.to_f64().unwrap_or(0.0)).sum();
        let expected_loss: f64 = losses.iter().sum();
        let count = |level: RiskLevel| risks.iter().filter(|r| r.risk_level == level).count();
        let flooded = risks.iter().filter(|r| r.is_flooded()).count();

        Self {
            total_portfolio_value: total,
            exposed_value: risks
                .iter()
                .filter(|r| r.impact_ratio > 0.0)
                .map(|r| r.value.to_f64().unwrap_or(0.0))
                .sum(),
            expected_loss,
            expected_loss_ratio: if total > 0.0 { expected_loss / total } else { 0.0 },
            max_single_property_loss: losses.iter().copied().fold(0.0, f64::max),
            loss_concentration_hhi: herfindahl(&losses),
            geographic_concentration_hhi,
            high_risk_properties: count(RiskLevel::High),
            medium_risk_properties: count(RiskLevel::Medium),
            low_risk_properties: count(RiskLevel::Low),
            properties_with_flooding: flooded,
            percentage_flooded: percentage(flooded as f64, risks.len() as f64),
        }
    }
}

/// Strength label for an elevation/depth correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationStrength {
    Strong,
    Weak,
    VeryWeak,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        if r.abs() > 0.5 {
            CorrelationStrength::Strong
        } else if r.abs() > 0.2 {
            CorrelationStrength::Weak
        } else {
            CorrelationStrength::VeryWeak
        }
    }
}

const ELEVATION_BANDS: [(f64, f64, &str); 5] = [
    (0.0, 10.0, "Very Low"),
    (10.0, 15.0, "Low"),
    (15.0, 20.0, "Medium"),
    (20.0, 30.0, "High"),
    (30.0, 50.0, "Very High"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationBand {
    pub label: String,
    pub min_m: f64,
    pub max_m: f64,
    pub properties: usize,
    pub flooded: usize,
    pub flood_rate_pct: f64,
    pub mean_flooded_depth_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Sanity checks that lower ground should flood more.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsCheck {
    /// Elevation and depth are clearly negatively correlated.
    pub realistic_correlation: bool,
    /// No property above 25 m sits under more than 1 m of water.
    pub no_high_elevation_flooding: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationAnalysis {
    pub elevation_depth_correlation: f64,
    pub correlation_strength: CorrelationStrength,
    pub elevation_range: ElevationRange,
    /// Only bands containing at least one property.
    pub bands: Vec<ElevationBand>,
    pub physics_check: PhysicsCheck,
}

impl ElevationAnalysis {
    pub fn compute(risks: &[PropertyRisk]) -> Self {
        let elevations: Vec<f64> = risks.iter().map(|r| r.elevation_m).collect();
        let depths: Vec<f64> = risks.iter().map(|r| r.flood_depth_m).collect();
        let r = pearson(&elevations, &depths);

        let range = if elevations.is_empty() {
            ElevationRange::default()
        } else {
            let m = mean(elevations.iter().copied());
            ElevationRange {
                min: elevations.iter().copied().fold(f64::INFINITY, f64::min),
                max: elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean: m,
                std: (mean(elevations.iter().map(|e| (e - m).powi(2)))).sqrt(),
            }
        };

        let bands = ELEVATION_BANDS
            .iter()
            .filter_map(|&(lo, hi, label)| {
                let members: Vec<&PropertyRisk> = risks
                    .iter()
                    .filter(|r| r.elevation_m >= lo && r.elevation_m < hi)
                    .collect();
                if members.is_empty() {
                    return None;
                }
                let flooded: Vec<f64> = members
                    .iter()
                    .filter(|r| r.is_flooded())
                    .map(|r| r.flood_depth_m)
                    .collect();
                Some(ElevationBand {
                    label: label.to_string(),
                    min_m: lo,
                    max_m: hi,
                    properties: members.len(),
                    flooded: flooded.len(),
                    flood_rate_pct: percentage(flooded.len() as f64, members.len() as f64),
                    mean_flooded_depth_m: mean(flooded.iter().copied()),
                })
            })
            .collect();

        let high_ground_flooded = risks
            .iter()
            .any(|r| r.elevation_m > 25.0 && r.flood_depth_m > 1.0);

        Self {
            elevation_depth_correlation: r,
            correlation_strength: CorrelationStrength::from_coefficient(r),
            elevation_range: range,
            bands,
            physics_check: PhysicsCheck {
                realistic_correlation: r < -0.2,
                no_high_elevation_flooding: !high_ground_flooded,
            },
        }
    }
}

/// Pearson correlation; 0 for fewer than two samples or a constant series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mx = mean(xs[..n].iter().copied());
    let my = mean(ys[..n].iter().copied());
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}
