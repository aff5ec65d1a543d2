use std::error::Error as StdError;

/// Payload did not match the entity's expected CRUD shape. Ack'd, never retried.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("entity descriptor must have exactly one event-key field, found {0}")]
    KeyFieldCount(usize),
}

/// Handler rejected the input as semantically invalid. Ack'd, logged at info.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct BusinessError(pub String);

/// Handler hit a transient condition. Enters the retry ladder.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct TechnicalError(pub String);

/// A `TechnicalError` sub-kind for failed upstream calls.
#[derive(thiserror::Error, Debug)]
#[error("external service call failed: {0}")]
pub struct ExternalServiceError(pub String);

impl From<ExternalServiceError> for TechnicalError {
    fn from(err: ExternalServiceError) -> Self {
        TechnicalError(err.0)
    }
}

/// Anything else. Ack'd and logged at error to avoid poison loops.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct UnknownError(pub String);

/// The classification a user handler returns. The consumer/retry engine
/// (§4.F) matches on this, never on a raw `Result<(), E>`.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Business(#[from] BusinessError),
    #[error(transparent)]
    Technical(#[from] TechnicalError),
    #[error(transparent)]
    Unknown(#[from] UnknownError),
}

/// Infrastructure-level failures: broker, serialization, configuration.
/// Never surfaced to the consumer decision table.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] Box<dyn StdError + Send + Sync>),
}
