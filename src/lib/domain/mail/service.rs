//! Mail service

use std::{fmt, sync::Arc};

use tracing::info;

use crate::domain::mail::{
    errors::SendMailError, CredentialProvider, Delivery, MailRequest, MailTransport,
    OutboundMessage, Sleeper, ThreadSleeper,
};

/// Sends one [`MailRequest`] end to end
pub struct MailService<C, T, S = ThreadSleeper>
where
    C: CredentialProvider,
    T: MailTransport,
    S: Sleeper,
{
    credentials: Arc<C>,
    delivery: Delivery<T, S>,
}

impl<C, T, S> fmt::Debug for MailService<C, T, S>
where
    C: CredentialProvider,
    T: MailTransport,
    S: Sleeper,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailService")
            .field("credentials", &"CredentialProvider")
            .field("delivery", &self.delivery)
            .finish()
    }
}

impl<C, T, S> MailService<C, T, S>
where
    C: CredentialProvider,
    T: MailTransport,
    S: Sleeper,
{
    /// Creates a new mail service.
    pub fn new(credentials: Arc<C>, delivery: Delivery<T, S>) -> Self {
        Self {
            credentials,
            delivery,
        }
    }

    /// Resolves credentials, builds the message and delivers it.
    ///
    /// Credentials are looked up first, and only in authenticated mode, so a missing credential
    /// is reported before any file is read. Validation and file errors are reported before any
    /// connection is made.
    ///
    /// # Arguments
    /// * `request` - The [`MailRequest`] to send.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] once the relay accepted the message, or an [`Err`]
    /// containing a [`SendMailError`].
    pub fn send_mail(&self, request: &MailRequest) -> Result<(), SendMailError> {
        let credentials = if request.authenticated {
            Some(self.credentials.credentials()?)
        } else {
            None
        };

        let message = OutboundMessage::build(request)?;

        info!(
            "built message \"{}\" from {} with {} attachment(s)",
            message.subject,
            message.from,
            message.attachments.len()
        );

        self.delivery.send(
            &message,
            request.port,
            request.authenticated,
            credentials.as_ref(),
        )?;

        Ok(())
    }
}
