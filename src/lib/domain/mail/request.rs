//! Mail request

use std::path::PathBuf;

use crate::domain::mail::{errors::ValidationError, EmailAddress};

/// Separator used by the raw recipient and attachment lists
pub const LIST_SEPARATOR: char = ';';

/// Everything needed to compose and deliver one email, as given on the command line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailRequest {
    /// Semicolon-separated recipient addresses
    pub to_addresses: String,

    /// The sender address
    pub from_address: String,

    /// The sender display name, blank for none
    pub from_name: String,

    /// The subject of the email
    pub subject: String,

    /// The HTML body of the email
    pub body: String,

    /// Semicolon-separated attachment paths, blank for none
    pub attachment_paths: String,

    /// Path to the logo image
    pub logo_path: PathBuf,

    /// Embed the logo at the end of the body
    pub embed_logo: bool,

    /// The SMTP port
    pub port: u16,

    /// Deliver through the authenticated relay
    pub authenticated: bool,
}

impl MailRequest {
    /// Checks the required fields, in the order from, to, subject, body.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from_address.trim().is_empty() {
            return Err(ValidationError::MissingField("from"));
        }

        if split_list(&self.to_addresses).next().is_none() {
            return Err(ValidationError::MissingField("to"));
        }

        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }

        if self.body.trim().is_empty() {
            return Err(ValidationError::MissingField("body"));
        }

        Ok(())
    }

    /// The sender address, validated.
    pub fn sender_address(&self) -> Result<EmailAddress, ValidationError> {
        EmailAddress::new(&self.from_address).map_err(|source| ValidationError::InvalidAddress {
            field: "from",
            source,
        })
    }

    /// The sender display name, if one was given.
    pub fn from_name(&self) -> Option<&str> {
        Some(self.from_name.trim()).filter(|name| !name.is_empty())
    }

    /// The recipients in the order given. Blank segments are skipped.
    pub fn recipients(&self) -> Result<Vec<EmailAddress>, ValidationError> {
        let recipients = split_list(&self.to_addresses)
            .map(|raw| {
                EmailAddress::new(raw)
                    .map_err(|source| ValidationError::InvalidAddress { field: "to", source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if recipients.is_empty() {
            return Err(ValidationError::MissingField("to"));
        }

        Ok(recipients)
    }

    /// The attachment paths in the order given. Blank segments are skipped.
    pub fn attachments(&self) -> Vec<PathBuf> {
        split_list(&self.attachment_paths)
            .map(PathBuf::from)
            .collect()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}
