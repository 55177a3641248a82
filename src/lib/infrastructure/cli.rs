//! Command-line arguments for the message

use std::path::PathBuf;

use clap::Parser;

use crate::{domain::mail::MailRequest, infrastructure::email::smtp::SMTPConfig};

/// Default logo file, looked up in the working directory
pub const LOGO_FILENAME: &str = "logo.jpg";

/// The message to send
///
/// Required fields default to empty here and are checked when the message is built, so a
/// missing value is reported the same way whether it came from a flag or the environment.
#[derive(Clone, Debug, Parser)]
pub struct MailArgs {
    /// Recipient address(es) [semicolon as separator]
    #[clap(long, env = "MAIL_TO", default_value = "")]
    pub to: String,

    /// Sender address
    #[clap(long, env = "MAIL_FROM", default_value = "")]
    pub from: String,

    /// Sender name (first & last)
    #[clap(long, env = "MAIL_SENDER", default_value = "")]
    pub sender: String,

    /// Subject of the email
    #[clap(long, env = "MAIL_SUBJECT", default_value = "")]
    pub subject: String,

    /// HTML body of the email
    #[clap(long, env = "MAIL_BODY", default_value = "")]
    pub body: String,

    /// File(s) to attach [semicolon as separator]
    #[clap(long, env = "MAIL_FILES", default_value = "")]
    pub file: String,

    /// Logo filename (jpg | png)
    #[clap(long, env = "MAIL_LOGO_FILE", default_value = LOGO_FILENAME)]
    pub logofile: PathBuf,

    /// Put the logo at the end of the email
    #[clap(long)]
    pub logo: bool,
}

impl MailArgs {
    /// Combine the message arguments with the SMTP settings into a [`MailRequest`]
    pub fn request(&self, smtp: &SMTPConfig) -> MailRequest {
        MailRequest {
            to_addresses: self.to.clone(),
            from_address: self.from.clone(),
            from_name: self.sender.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachment_paths: self.file.clone(),
            logo_path: self.logofile.clone(),
            embed_logo: self.logo,
            port: smtp.port(),
            authenticated: smtp.authenticated,
        }
    }
}
