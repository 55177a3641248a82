#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Internal Communication: send one HTML email through the Office 365 relays

use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use internalcom::{
    domain::mail::{Delivery, MailService},
    infrastructure::{
        cli::MailArgs,
        credentials::env::EnvCredentialProvider,
        email::smtp::{SMTPConfig, SMTPMailer},
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// The message to send
    #[clap(flatten)]
    pub mail: MailArgs,

    /// The SMTP configuration
    #[clap(flatten)]
    pub smtp: SMTPConfig,
}

#[mutants::skip]
fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    info!(
        "internalcom - Internal Communication - Email through O365 - v{}",
        env!("CARGO_PKG_VERSION")
    );

    let request = args.mail.request(&args.smtp);

    let service = MailService::new(
        Arc::new(EnvCredentialProvider::default()),
        Delivery::new(
            Arc::new(SMTPMailer::new(args.smtp.timeout())),
            args.smtp.retry_policy(),
        ),
    );

    service
        .send_mail(&request)
        .context("unable to send the email")?;

    info!("email sent");

    Ok(())
}
