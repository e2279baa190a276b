//! Portfolio risk: per-property assessment, spatial correlation, Monte Carlo
//! loss simulation, geographic concentration and clustering.

pub mod assessment;
pub mod clusters;
pub mod concentration;
pub mod correlation;
pub mod monte_carlo;
