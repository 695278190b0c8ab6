//! Error types and handling for stepcharge
//!
//! Configuration problems (missing or misshapen tables) and runtime lookups
//! that fall outside a loaded table are reported through one error type so
//! callers can fall back to "no step charging" instead of aborting.

use thiserror::Error;

/// Result type alias for stepcharge operations
pub type Result<T> = std::result::Result<T, StepChargeError>;

/// Main error type for stepcharge
#[derive(Debug, Error)]
pub enum StepChargeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// A table's dimensions do not match the declared step/age counts
    #[error("Shape mismatch in table {table}: expected {expected}, found {found}")]
    ShapeMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    /// A required table is absent
    #[error("Missing table: {table}")]
    Missing { table: String },

    /// A lookup fell outside the loaded table
    #[error("Index out of range in {table}: index {index}, size {size}")]
    IndexOutOfRange {
        table: String,
        index: usize,
        size: usize,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl StepChargeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new shape mismatch error
    pub fn shape_mismatch<S: Into<String>>(table: S, expected: usize, found: usize) -> Self {
        Self::ShapeMismatch {
            table: table.into(),
            expected,
            found,
        }
    }

    /// Create a new missing table error
    pub fn missing<S: Into<String>>(table: S) -> Self {
        Self::Missing {
            table: table.into(),
        }
    }

    /// Create a new out-of-range error
    pub fn out_of_range<S: Into<String>>(table: S, index: usize, size: usize) -> Self {
        Self::IndexOutOfRange {
            table: table.into(),
            index,
            size,
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Whether the error comes from configuration data rather than a runtime lookup
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Validation { .. }
                | Self::ShapeMismatch { .. }
                | Self::Missing { .. }
        )
    }
}

impl From<std::io::Error> for StepChargeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for StepChargeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StepChargeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
