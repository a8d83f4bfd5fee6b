use serde::{Deserialize, Serialize};

/// Failures reported by the emulated DirectInput surface.
///
/// The variants mirror the result codes a DirectInput caller can observe, so
/// they are serializable and travel unchanged across the control socket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DirectInputError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Device not registered: {0}")]
    DeviceNotRegistered(String),

    #[error("Input lost")]
    InputLost,
}

impl DirectInputError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParam(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::ObjectNotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DirectInputError>;
