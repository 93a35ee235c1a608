//! Planning errors

use crate::services::routing::RoutingError;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Rejected before the simulator runs
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not route between locations: {0}")]
    Routing(#[from] RoutingError),

    /// A scheduling invariant was violated. Indicates a rule-priority bug.
    #[error("Internal planning error: {0}")]
    Internal(String),
}

impl PlanError {
    /// Error code used on the wire
    pub const fn code(&self) -> &'static str {
        match self {
            PlanError::InvalidInput(_) => "INVALID_INPUT",
            PlanError::Routing(_) => "ROUTING_ERROR",
            PlanError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Check a scheduling invariant. Panics in debug builds, returns
/// `PlanError::Internal` in release builds. Never clamps.
pub(crate) fn ensure_invariant(condition: bool, message: impl FnOnce() -> String) -> Result<(), PlanError> {
    if condition {
        return Ok(());
    }
    let message = message();
    tracing::error!("HOS invariant violated: {}", message);
    debug_assert!(false, "HOS invariant violated: {}", message);
    Err(PlanError::Internal(message))
}
