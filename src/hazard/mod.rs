//! Flood hazard: event selection, depth interpolation, depth-damage.

pub mod damage;
pub mod event;
pub mod interpolation;
