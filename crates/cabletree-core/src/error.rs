//! Error types for the simulation engine
//!
//! None of these are recoverable: the engine treats correctness as a
//! precondition and aborts the simulation on the first failure, naming the
//! failing entity.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the simulation engine
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed recipe or cell description
    #[error("Model description error for {entity}: {reason}")]
    ModelDescription {
        /// The offending entity (gid, mechanism name, or connection endpoints)
        entity: String,
        /// Reason for rejection
        reason: String,
    },

    /// Parameter outside its declared range
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Offending value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// NaN/Inf in solver output or divergent mechanism state
    #[error("Numerical error at cell {gid}, t={time} ms: {reason}")]
    Numerical {
        /// Gid of the cell where the failure was detected
        gid: u64,
        /// Simulation time of the failure (ms)
        time: f64,
        /// Reason for failure
        reason: String,
    },

    /// A collective operation failed or ranks disagreed on participation
    #[error("Communication error: {reason}")]
    Communication {
        /// Reason for failure
        reason: String,
    },
}

impl CoreError {
    /// Create a model description error
    pub fn model_description(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelDescription {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical(gid: u64, time: f64, reason: impl Into<String>) -> Self {
        Self::Numerical {
            gid,
            time,
            reason: reason.into(),
        }
    }

    /// Create a communication error
    pub fn communication(reason: impl Into<String>) -> Self {
        Self::Communication {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_construction() {
        let err = CoreError::invalid_parameter("dt", 0.0, "> 0");
        assert!(matches!(err, CoreError::InvalidParameter { .. }));

        let err = CoreError::model_description("gid 12", "segment parent out of range");
        assert!(matches!(err, CoreError::ModelDescription { .. }));
    }

    #[test]
    fn error_display_names_entity() {
        let err = CoreError::numerical(3, 12.5, "NaN voltage after solve");
        let msg = format!("{}", err);
        assert!(msg.contains("cell 3"));
        assert!(msg.contains("12.5"));
    }
}
