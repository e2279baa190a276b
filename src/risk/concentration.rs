//! Grid-based geographic concentration of value at risk.

use crate::core::error::ConfigError;
use crate::core::geo::METERS_PER_DEGREE;
use crate::core::property::Property;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentrationConfig {
    /// Grid cell edge length in metres.
    pub grid_cell_m: f64,
}

impl Default for ConcentrationConfig {
    fn default() -> Self {
        Self {
            grid_cell_m: 1000.0,
        }
    }
}

impl ConcentrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid_cell_m.is_finite() && self.grid_cell_m > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "grid_cell_m",
                value: self.grid_cell_m,
            });
        }
        Ok(())
    }
}

/// Aggregates for one occupied grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Row index (latitude) from the portfolio's southern edge.
    pub row: i64,
    /// Column index (longitude) from the portfolio's western edge.
    pub col: i64,
    pub property_count: usize,
    pub mean_depth_m: f64,
    pub mean_impact_ratio: f64,
    pub total_value: f64,
    pub value_at_risk: f64,
    /// Squared share of portfolio value at risk.
    pub concentration_index: f64,
}

impl GridCell {
    pub fn id(&self) -> String {
        format!("cell_{}_{}", self.row, self.col)
    }
}

/// Concentration table sorted by value at risk, largest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConcentrationReport {
    pub grid_cell_m: f64,
    pub cells: Vec<GridCell>,
    pub total_value_at_risk: f64,
    /// Herfindahl-Hirschman index over cell shares of value at risk.
    pub hhi: f64,
}

impl ConcentrationReport {
    pub fn top(&self, n: usize) -> &[GridCell] {
        &self.cells[..n.min(self.cells.len())]
    }
}

impl fmt::Display for ConcentrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Concentration ({} m grid) ===", self.grid_cell_m)?;
        writeln!(f, "  Occupied cells: {}", self.cells.len())?;
        writeln!(f, "  HHI: {:.4}", self.hhi)?;
        for cell in self.top(5) {
            writeln!(
                f,
                "  {:<14} {:>4} props  VaR {:>14.2}  share² {:.4}",
                cell.id(),
                cell.property_count,
                cell.value_at_risk,
                cell.concentration_index
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct CellAccumulator {
    count: usize,
    depth_sum: f64,
    impact_sum: f64,
    value: f64,
    value_at_risk: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConcentrationAnalyzer {
    config: ConcentrationConfig,
}

impl ConcentrationAnalyzer {
    pub fn new(config: ConcentrationConfig) -> Self {
        Self { config }
    }

    /// Bucket properties into the grid. `depths[i]` and `impacts[i]` belong
    /// to `properties[i]`.
    pub fn analyze(&self, properties: &[Property], depths: &[f64], impacts: &[f64]) -> ConcentrationReport {
        let cell_deg = self.config.grid_cell_m / METERS_PER_DEGREE;
        let n = properties.len().min(depths.len()).min(impacts.len());
        if n == 0 || !cell_deg.is_finite() || cell_deg <= 0.0 {
            return ConcentrationReport {
                grid_cell_m: self.config.grid_cell_m,
                ..Default::default()
            };
        }

        let min_lat = properties[..n]
            .iter()
            .map(|p| p.location().latitude)
            .fold(f64::INFINITY, f64::min);
        let min_lon = properties[..n]
            .iter()
            .map(|p| p.location().longitude)
            .fold(f64::INFINITY, f64::min);

        let mut grid: BTreeMap<(i64, i64), CellAccumulator> = BTreeMap::new();
        for ((property, depth), impact) in properties.iter().zip(depths).zip(impacts) {
            let loc = property.location();
            let row = ((loc.latitude - min_lat) / cell_deg).floor() as i64;
            let col = ((loc.longitude - min_lon) / cell_deg).floor() as i64;
            let value = property.value_f64();
            let acc = grid.entry((row, col)).or_default();
            acc.count += 1;
            acc.depth_sum += depth;
            acc.impact_sum += impact;
            acc.value += value;
            acc.value_at_risk += value * impact;
        }

        let total_var: f64 = grid.values().map(|c| c.value_at_risk).sum();
        let mut cells: Vec<GridCell> = grid
            .into_iter()
            .map(|((row, col), acc)| {
                let share = if total_var > 0.0 {
                    acc.value_at_risk / total_var
                } else {
                    0.0
                };
                GridCell {
                    row,
                    col,
                    property_count: acc.count,
                    mean_depth_m: acc.depth_sum / acc.count as f64,
                    mean_impact_ratio: acc.impact_sum / acc.count as f64,
                    total_value: acc.value,
                    value_at_risk: acc.value_at_risk,
                    concentration_index: share * share,
                }
            })
            .collect();
        cells.sort_by(|a, b| b.value_at_risk.total_cmp(&a.value_at_risk));

        let hhi = cells.iter().map(|c| c.concentration_index).sum();
        ConcentrationReport {
            grid_cell_m: self.config.grid_cell_m,
            cells,
            total_value_at_risk: total_var,
            hhi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn prop(id: &str, lat: f64, lon: f64) -> Property {
        Property::new(id, lat, lon, dec!(100000)).unwrap()
    }

    #[test]
    fn test_single_cell_full_concentration() {
        let props = vec![prop("A", 51.5, -0.1), prop("B", 51.5001, -0.1001)];
        let report = ConcentrationAnalyzer::default().analyze(&props, &[0.5, 1.0], &[0.25, 0.4]);
        assert_eq!(report.cells.len(), 1);
        assert_relative_eq!(report.hhi, 1.0);
        let cell = &report.cells[0];
        assert_eq!(cell.property_count, 2);
        assert_relative_eq!(cell.mean_depth_m, 0.75);
        assert_relative_eq!(cell.value_at_risk, 65_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_two_equal_cells() {
        let props = vec![prop("A", 51.5, -0.1), prop("B", 51.55, -0.1)];
        let report = ConcentrationAnalyzer::default().analyze(&props, &[1.0, 1.0], &[0.4, 0.4]);
        assert_eq!(report.cells.len(), 2);
        assert_relative_eq!(report.hhi, 0.5, epsilon = 1e-12);
        assert_relative_eq!(report.cells[0].concentration_index, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_cells_sorted_by_value_at_risk() {
        let props = vec![prop("A", 51.5, -0.1), prop("B", 51.55, -0.1), prop("C", 51.6, -0.1)];
        let report = ConcentrationAnalyzer::default().analyze(&props, &[0.1, 2.0, 1.0], &[0.05, 0.6, 0.4]);
        let vars: Vec<f64> = report.cells.iter().map(|c| c.value_at_risk).collect();
        assert!(vars.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(report.cells[0].row, 5);
    }

    #[test]
    fn test_no_value_at_risk() {
        let props = vec![prop("A", 51.5, -0.1), prop("B", 51.55, -0.1)];
        let report = ConcentrationAnalyzer::default().analyze(&props, &[0.0, 0.0], &[0.0, 0.0]);
        assert_eq!(report.hhi, 0.0);
        assert!(report.cells.iter().all(|c| c.concentration_index == 0.0));
    }

    #[test]
    fn test_empty_portfolio() {
        let report = ConcentrationAnalyzer::default().analyze(&[], &[], &[]);
        assert!(report.cells.is_empty());
        assert_eq!(report.hhi, 0.0);
    }
}
