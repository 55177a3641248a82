//! Credentials from environment variables

use std::env;

use crate::domain::mail::{errors::CredentialsError, CredentialProvider, Credentials};

/// Environment variable holding the SMTP user
pub const SMTP_USER_ENV: &str = "SMTP_USER";

/// Environment variable holding the SMTP password
pub const SMTP_PWD_ENV: &str = "SMTP_PWD";

/// Reads the SMTP user and password from the process environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvCredentialProvider {
    user_var: String,
    password_var: String,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(SMTP_USER_ENV, SMTP_PWD_ENV)
    }
}

impl EnvCredentialProvider {
    /// Create a provider reading the given variables
    pub fn new(user_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            user_var: user_var.into(),
            password_var: password_var.into(),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credentials(&self) -> Result<Credentials, CredentialsError> {
        let username = read_var(&self.user_var)?;
        let password = read_var(&self.password_var)?;

        Ok(Credentials::new(username, password))
    }
}

fn read_var(name: &str) -> Result<String, CredentialsError> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CredentialsError::Missing {
            variable: name.to_string(),
        })
}
