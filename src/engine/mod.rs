//! Run configuration and the end-to-end orchestrator.

pub mod config;
pub mod orchestrator;
