use std::time::Duration;

use thiserror::Error;

use crate::protocol::{ErrorKind, ErrorPayload};

pub type ChatResult<T> = Result<T, ChatError>;

/// Everything the broker can fail with while handling one inbound event.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Incompatible client version")]
    IncompatibleVersion {
        compatible: Vec<String>,
        client_version: String,
    },

    #[error("connection is not identified, send identify first")]
    NotIdentified,

    #[error("invalid {event} payload: {reason}")]
    Validation { event: String, reason: String },

    #[error("could not persist message: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("directory lookup failed: {0}")]
    Directory(#[from] reqwest::Error),

    #[error("directory lookup timed out after {0:?}")]
    DirectoryTimeout(Duration),
}

impl ChatError {
    pub fn validation(event: impl Into<String>, reason: impl ToString) -> Self {
        Self::Validation {
            event: event.into(),
            reason: reason.to_string(),
        }
    }

    /// A bad version or a bad identify ends the connection, everything else only the operation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::IncompatibleVersion { .. } => true,
            Self::Validation { event, .. } => event == "identify",
            _ => false,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let kind = match self {
            Self::IncompatibleVersion { .. } | Self::NotIdentified => ErrorKind::Protocol,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Directory(_) | Self::DirectoryTimeout(_) => ErrorKind::Collaborator,
        };

        let mut payload = ErrorPayload {
            kind,
            message: self.to_string(),
            compatible_versions: None,
            client_version: None,
        };
        if let Self::IncompatibleVersion { compatible, client_version } = self {
            payload.compatible_versions = Some(compatible.clone());
            payload.client_version = Some(client_version.clone());
        }
        payload
    }
}
