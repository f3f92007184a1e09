//! Error type shared by every planning stage.

/// Errors raised while building or solving a planning run.
///
/// Solver infeasibility is not an error: it is reported as
/// [`PlanOutcome::Infeasible`](crate::fleet::PlanOutcome::Infeasible).
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no travel data from {origin} to {destination}")]
    MissingTravelData { origin: String, destination: String },

    #[error("stores not served by any feasible tour: {}", stores.join(", "))]
    UnreachableStore { stores: Vec<String> },

    #[error("travel-time source failure: {0}")]
    TravelSource(String),

    #[error("integer program is unbounded")]
    SolverUnbounded,

    #[error("solver failure: {0}")]
    Solver(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PlannerError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PlannerError::InvalidConfiguration(message.into())
    }
}
