//! Delivery with bounded retry

use std::{fmt, sync::Arc, thread, time::Duration};

use tracing::{info, warn};

use crate::domain::mail::{
    errors::DeliveryError, Connection, Credentials, Endpoint, MailTransport, OutboundMessage,
};

/// How often and how patiently delivery is retried
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// The delay before the second attempt, doubled for every attempt after that
    pub initial_backoff: Duration,

    /// The longest delay between two attempts
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries straight away
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// The delay after the given failed attempt, starting at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);

        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Waits between two attempts
pub trait Sleeper: Send + Sync + 'static {
    /// Block the current thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Delivers a message through a [`MailTransport`], retrying transient failures
pub struct Delivery<T, S = ThreadSleeper>
where
    T: MailTransport,
    S: Sleeper,
{
    transport: Arc<T>,
    policy: RetryPolicy,
    sleeper: S,
}

impl<T, S> fmt::Debug for Delivery<T, S>
where
    T: MailTransport,
    S: Sleeper,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T> Delivery<T>
where
    T: MailTransport,
{
    /// Create a new delivery executor that sleeps on the current thread between attempts.
    pub fn new(transport: Arc<T>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, policy, ThreadSleeper)
    }
}

impl<T, S> Delivery<T, S>
where
    T: MailTransport,
    S: Sleeper,
{
    /// Create a new delivery executor with a custom [`Sleeper`].
    pub fn with_sleeper(transport: Arc<T>, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            transport,
            policy,
            sleeper,
        }
    }

    /// Selects the relay for the mode and attaches credentials when the mode needs them.
    ///
    /// Credentials are never sent to the unauthenticated relay.
    pub fn connection(
        &self,
        port: u16,
        authenticated: bool,
        credentials: Option<&Credentials>,
    ) -> Result<Connection, DeliveryError> {
        let endpoint = Endpoint::select(authenticated, port);

        let credentials = if authenticated {
            Some(credentials.ok_or(DeliveryError::MissingCredentials)?.clone())
        } else {
            None
        };

        Ok(Connection {
            endpoint,
            credentials,
        })
    }

    /// Sends a message, retrying failures the transport reports as retryable.
    ///
    /// # Arguments
    /// * `message` - The [`OutboundMessage`] to send.
    /// * `port` - The relay port.
    /// * `authenticated` - Deliver through the authenticated relay.
    /// * `credentials` - Required when `authenticated` is set, ignored otherwise.
    ///
    /// # Returns
    /// - [`Ok`] as soon as one attempt succeeds.
    /// - [`Err`] with [`DeliveryError::Rejected`] on the first non-retryable failure.
    /// - [`Err`] with [`DeliveryError::RetriesExhausted`] once every attempt has failed.
    pub fn send(
        &self,
        message: &OutboundMessage,
        port: u16,
        authenticated: bool,
        credentials: Option<&Credentials>,
    ) -> Result<(), DeliveryError> {
        let connection = self.connection(port, authenticated, credentials)?;
        let attempts = self.policy.attempts();

        info!(
            "sending to {} recipient(s) through {}:{}",
            message.to.len(),
            connection.endpoint.host,
            connection.endpoint.port
        );

        let mut attempt = 1;
        loop {
            match self.transport.send(&connection, message) {
                Ok(()) => {
                    info!("message accepted on attempt {}", attempt);

                    return Ok(());
                }
                Err(source) if !source.is_retryable() => {
                    return Err(DeliveryError::Rejected { attempt, source });
                }
                Err(source) if attempt >= attempts => {
                    return Err(DeliveryError::RetriesExhausted { attempts, source });
                }
                Err(err) => {
                    let delay = self.policy.backoff(attempt);
                    warn!("{} - retry {} in {:?}", err, attempt, delay);

                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
