use msgframe_frame::FrameError;

/// Errors that can occur in the message layer.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The value could not be turned into payload bytes.
    #[error("failed to serialize value: {0}")]
    Serialization(String),

    /// The payload could not be turned back into a value.
    #[error("failed to deserialize payload: {0}")]
    Deserialization(String),

    /// Framing or transport failure underneath the message layer.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, MessageError>;
