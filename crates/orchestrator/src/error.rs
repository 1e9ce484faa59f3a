#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("pipeline {0:?} is already registered and mid-processing")]
    RegistrationInFlight(String),
    #[error("pipeline {0:?} is not registered")]
    NotRegistered(String),
}
