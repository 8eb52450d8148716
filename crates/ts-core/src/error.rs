//! Error types for TensorStat

use thiserror::Error;

/// TensorStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Requested dtype token is not one of `float`, `int`, `bool`
    #[error("Invalid dtype: {0}")]
    InvalidDType(String),

    /// Broadcasting or rank mismatch in a shape-sensitive operation
    #[error("Shape error: {0}")]
    Shape(String),

    /// Argument outside the mathematically valid domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Profile-likelihood statistic requested on a model without a POI
    #[error("{0}")]
    UnspecifiedPoi(String),

    /// Unrecognized test-statistic name in a name-based lookup
    #[error("Invalid test statistic: {0}")]
    InvalidTestStatistic(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Optimizer failure, surfaced unchanged from the optimizer backend
    #[error("Optimization error: {0}")]
    Optimization(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspecified_poi_message_is_verbatim() {
        let err = Error::UnspecifiedPoi("No POI is defined.".to_string());
        assert_eq!(err.to_string(), "No POI is defined.");
    }

    #[test]
    fn test_invalid_dtype_names_token() {
        let err = Error::InvalidDType("long".to_string());
        assert!(err.to_string().contains("Invalid dtype: long"));
    }
}
