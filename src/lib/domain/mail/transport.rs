//! Mail transport

#[cfg(test)]
use mockall::mock;

use crate::domain::mail::{errors::TransportError, Credentials, OutboundMessage};

/// Relay used in authenticated mode
pub const AUTHENTICATED_RELAY: &str = "smtp.office365.com";

/// Relay used in unauthenticated mode, trusted at the network level
pub const UNAUTHENTICATED_RELAY: &str = "brinksco.mail.protection.outlook.com";

/// How the transport secures the connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsPolicy {
    /// The connection must be upgraded with STARTTLS before anything else is sent
    MandatoryStartTls,

    /// Whatever the transport does by default
    TransportDefault,
}

/// The relay a message is delivered to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// The relay hostname
    pub host: String,

    /// The relay port
    pub port: u16,

    /// The TLS policy for the connection
    pub tls: TlsPolicy,
}

impl Endpoint {
    /// Selects the relay for the given mode. The port is passed through as given.
    pub fn select(authenticated: bool, port: u16) -> Self {
        if authenticated {
            Self {
                host: AUTHENTICATED_RELAY.to_string(),
                port,
                tls: TlsPolicy::MandatoryStartTls,
            }
        } else {
            Self {
                host: UNAUTHENTICATED_RELAY.to_string(),
                port,
                tls: TlsPolicy::TransportDefault,
            }
        }
    }
}

/// Everything a transport needs to open a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    /// The relay to connect to
    pub endpoint: Endpoint,

    /// Credentials to authenticate with, if any
    pub credentials: Option<Credentials>,
}

/// Delivers one message per call
pub trait MailTransport: Send + Sync + 'static {
    /// Open a session and send a message.
    ///
    /// # Arguments
    /// * `connection` - The [`Connection`] describing the relay and credentials.
    /// * `message` - The [`OutboundMessage`] to send.
    ///
    /// # Returns
    /// A [`Result`] indicating success, or the kind of failure as a [`TransportError`].
    fn send(&self, connection: &Connection, message: &OutboundMessage)
        -> Result<(), TransportError>;
}

#[cfg(test)]
mock! {
    pub MailTransport {}

    impl MailTransport for MailTransport {
        fn send(&self, connection: &Connection, message: &OutboundMessage) -> Result<(), TransportError>;
    }
}
