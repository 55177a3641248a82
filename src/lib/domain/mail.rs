//! Mail composition and delivery.

mod credentials;
mod delivery;
mod email_address;
mod message;
mod request;
mod service;
mod transport;

pub mod errors;

pub use credentials::{CredentialProvider, Credentials};
pub use delivery::{Delivery, RetryPolicy, Sleeper, ThreadSleeper};
pub use email_address::{EmailAddress, EmailAddressError};
pub use message::{Attachment, InlineResource, OutboundMessage, Sender};
pub use request::MailRequest;
pub use service::MailService;
pub use transport::{
    Connection, Endpoint, MailTransport, TlsPolicy, AUTHENTICATED_RELAY, UNAUTHENTICATED_RELAY,
};
