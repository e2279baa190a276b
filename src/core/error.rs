use thiserror::Error;

/// Structurally broken input records, rejected when a record is built.
///
/// Soft defects (an unrecognised property type, a missing elevation) are
/// not errors: they are logged and defaulted by the record constructors.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier { kind: &'static str },
    #[error("{id}: {field} must be finite, got {value}")]
    NonFinite {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("{id}: {field} must be positive, got {value}")]
    NotPositive {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("{id}: {field} must be non-negative, got {value}")]
    Negative {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("{id}: coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates {
        id: String,
        latitude: f64,
        longitude: f64,
    },
    #[error("{id}: {field} must lie in [0, 1], got {value}")]
    OutOfUnitRange {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("{id}: remaining term {remaining} months exceeds original term {original} months")]
    TermMismatch {
        id: String,
        remaining: u32,
        original: u32,
    },
}

/// Invalid engine configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("simulation count must be at least 1")]
    NoSimulations,
    #[error("invalid configuration file: {0}")]
    Parse(String),
}
