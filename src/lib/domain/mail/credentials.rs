//! SMTP credentials

use std::fmt;

#[cfg(test)]
use mockall::mock;

use crate::domain::mail::errors::CredentialsError;

/// Username and password for the authenticated relay
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The SMTP user
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The SMTP password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Source of SMTP credentials
pub trait CredentialProvider: Send + Sync + 'static {
    /// Resolve the credentials for the authenticated relay.
    ///
    /// # Returns
    /// - [`Ok`] with the [`Credentials`] if both user and password are set.
    /// - [`Err`] containing a [`CredentialsError`] naming the first missing value.
    fn credentials(&self) -> Result<Credentials, CredentialsError>;
}

#[cfg(test)]
mock! {
    pub CredentialProvider {}

    impl CredentialProvider for CredentialProvider {
        fn credentials(&self) -> Result<Credentials, CredentialsError>;
    }
}
