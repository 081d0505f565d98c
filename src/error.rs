use thiserror::Error;

/// Errors surfaced by the engine's public API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
}

/// How a measurement phase ended early. `Cancelled` is not a user-visible
/// failure: cancellation only happens through `reset()`/`start()`, which
/// already put the shared state where it belongs, so the controller discards
/// it without touching the status.
#[derive(Debug, Error)]
pub(crate) enum PhaseError {
    #[error("run was cancelled")]
    Cancelled,
    #[error("transfer could not be opened")]
    Transport(#[source] reqwest::Error),
    #[error("response body was unusable")]
    Body(#[source] reqwest::Error),
}
