use thiserror::Error;

use crate::signals::BusState;

/// Estimator error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Signal bus not ready (state: {0:?})")]
    SignalsNotReady(BusState),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unexpected CAN frame id: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedFrame { expected: u32, actual: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for estimator operations
pub type EResult<T> = Result<T, EstimatorError>;

/// Map a poisoned lock into an `Internal` error naming the lock
pub(crate) fn lock_poisoned<E>(what: &str) -> impl FnOnce(E) -> EstimatorError + '_ {
    move |_| EstimatorError::Internal(format!("Failed to acquire {} lock", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EstimatorError::SignalsNotReady(BusState::Startup);
        assert_eq!(err.to_string(), "Signal bus not ready (state: Startup)");

        let err = EstimatorError::UnexpectedFrame {
            expected: 0x01,
            actual: 0x02,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected CAN frame id: expected 0x01, got 0x02"
        );
    }

    #[test]
    fn test_lock_poisoned_mapping() {
        let err = lock_poisoned::<()>("signal bus")(());
        assert_eq!(
            err,
            EstimatorError::Internal("Failed to acquire signal bus lock".to_string())
        );
    }
}
