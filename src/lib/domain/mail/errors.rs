//! Error types for composing and delivering mail

use std::{io, path::PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::mail::EmailAddressError;

/// A required input is missing or malformed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An address field does not hold a valid mailbox
    #[error("invalid address in {field}: {source}")]
    InvalidAddress {
        /// The field the address came from
        field: &'static str,

        /// Why the address was rejected
        source: EmailAddressError,
    },
}

/// Errors that can occur when building an outbound message
#[derive(Debug, Error)]
pub enum BuildError {
    /// The request failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An attachment or the logo could not be read
    #[error("unable to read {}: {source}", .path.display())]
    Attachment {
        /// The offending path
        path: PathBuf,

        /// The underlying I/O error
        source: io::Error,
    },
}

/// Errors that can occur when resolving SMTP credentials
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    /// A credential is absent or blank
    #[error("unable to retrieve SMTP credentials, make sure the environment sets {variable}")]
    Missing {
        /// The name of the missing setting
        variable: String,
    },
}

/// A failed delivery attempt, as reported by a transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection or a command timed out
    #[error("timeout: {0}")]
    Timeout(String),

    /// A network failure other than a timeout
    #[error("network error: {0}")]
    Network(String),

    /// The relay answered with a transient (4xx) reply
    #[error("transient relay error: {0}")]
    Transient(String),

    /// The relay rejected the credentials
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The relay refused the message or the connection for good
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::Network(_) | TransportError::Transient(_)
        )
    }
}

/// Errors that can occur when delivering a message
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Authenticated delivery was requested without credentials
    #[error("authenticated delivery requires credentials")]
    MissingCredentials,

    /// The relay failed with an error that retrying cannot fix
    #[error("delivery failed on attempt {attempt}: {source}")]
    Rejected {
        /// The attempt that failed, starting at 1
        attempt: u32,

        /// The transport error
        source: TransportError,
    },

    /// Every attempt failed with a retryable error
    #[error("delivery failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The number of attempts made
        attempts: u32,

        /// The last transport error observed
        source: TransportError,
    },
}

/// Errors that can occur when sending a mail request end to end
#[derive(Debug, Error)]
pub enum SendMailError {
    /// Credentials could not be resolved
    #[error(transparent)]
    Configuration(CredentialsError),

    /// The message could not be built
    #[error(transparent)]
    Build(BuildError),

    /// The message could not be delivered
    #[error(transparent)]
    Delivery(DeliveryError),
}

impl From<CredentialsError> for SendMailError {
    fn from(err: CredentialsError) -> Self {
        debug!("CredentialsError -> SendMailError");

        SendMailError::Configuration(err)
    }
}

impl From<BuildError> for SendMailError {
    fn from(err: BuildError) -> Self {
        debug!("BuildError -> SendMailError");

        SendMailError::Build(err)
    }
}

impl From<ValidationError> for SendMailError {
    fn from(err: ValidationError) -> Self {
        debug!("ValidationError -> SendMailError");

        SendMailError::Build(BuildError::Validation(err))
    }
}

impl From<DeliveryError> for SendMailError {
    fn from(err: DeliveryError) -> Self {
        debug!("DeliveryError -> SendMailError");

        SendMailError::Delivery(err)
    }
}
