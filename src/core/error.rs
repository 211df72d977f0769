use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// An input invariant failed; no trial was run.
    #[error("invalid parameters: {field} {reason}")]
    InvalidParameters { field: &'static str, reason: String },
}

impl SimulationError {
    pub(crate) fn invalid(field: &'static str, reason: &str) -> Self {
        SimulationError::InvalidParameters {
            field,
            reason: reason.to_string(),
        }
    }
}
