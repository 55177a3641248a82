//! SMTP transport implementation

use std::{error::Error as StdError, io, time::Duration};

use clap::Parser;
use lettre::{
    address::AddressError,
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        Error as SmtpError,
    },
    Address, Message, SmtpTransport, Transport,
};
use tracing::debug;

use crate::domain::mail::{
    errors::TransportError, Connection, MailTransport, OutboundMessage, RetryPolicy, TlsPolicy,
};

/// Submission port, used by default in authenticated mode
pub const SUBMISSION_PORT: u16 = 587;

/// Relay port, used by default in unauthenticated mode
pub const RELAY_PORT: u16 = 25;

/// SMTP configuration
#[derive(Clone, Debug, Parser)]
pub struct SMTPConfig {
    /// Use TLS authentication with SMTP_USER / SMTP_PWD, else the no-auth relay
    #[clap(long = "authent", env = "SMTP_AUTHENTICATED")]
    pub authenticated: bool,

    /// The SMTP port [default: 587 with --authent, 25 otherwise]
    #[clap(long, env = "SMTP_PORT")]
    pub port: Option<u16>,

    /// Maximum number of delivery attempts
    #[clap(long, env = "SMTP_RETRIES", default_value = "5")]
    pub retries: u32,

    /// Connection and command timeout, in seconds, at least 1
    #[clap(
        long,
        env = "SMTP_TIMEOUT",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Delay before the first retry, in milliseconds, doubled on every retry
    #[clap(long = "retry-delay", env = "SMTP_RETRY_DELAY_MS", default_value = "500")]
    pub retry_delay_ms: u64,

    /// Longest delay between two retries, in milliseconds
    #[clap(long = "max-retry-delay", env = "SMTP_MAX_RETRY_DELAY_MS", default_value = "8000")]
    pub max_retry_delay_ms: u64,
}

impl SMTPConfig {
    /// The port to connect to, derived from the mode when not given
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.authenticated {
            SUBMISSION_PORT
        } else {
            RELAY_PORT
        })
    }

    /// The per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// The retry policy for delivery
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retries,
            initial_backoff: Duration::from_millis(self.retry_delay_ms),
            max_backoff: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

/// SMTP mailer
#[derive(Debug, Clone)]
pub struct SMTPMailer {
    timeout: Duration,
}

impl SMTPMailer {
    /// Create a new SMTP mailer
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create the SMTP transport for a connection
    pub fn mailer(&self, connection: &Connection) -> Result<SmtpTransport, TransportError> {
        let host = connection.endpoint.host.as_str();

        let relay = match connection.endpoint.tls {
            TlsPolicy::MandatoryStartTls => SmtpTransport::starttls_relay(host).map_err(classify)?,
            TlsPolicy::TransportDefault => SmtpTransport::builder_dangerous(host).tls(
                Tls::Opportunistic(TlsParameters::new(host.to_string()).map_err(classify)?),
            ),
        };

        let relay = relay
            .port(connection.endpoint.port)
            .timeout(Some(self.timeout));

        debug!(
            "smtp transport {}:{} ({:?}, authenticated: {})",
            host,
            connection.endpoint.port,
            connection.endpoint.tls,
            connection.credentials.is_some()
        );

        Ok(match &connection.credentials {
            Some(creds) => relay
                .credentials(Credentials::new(
                    creds.username().to_string(),
                    creds.password().to_string(),
                ))
                .build(),
            None => relay.build(),
        })
    }
}

impl MailTransport for SMTPMailer {
    fn send(
        &self,
        connection: &Connection,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        let email = to_message(message)?;

        match self.mailer(connection)?.send(&email) {
            Ok(_) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

/// Converts an [`OutboundMessage`] into a lettre [`Message`].
///
/// A message without inline resources or attachments is a single HTML part. Otherwise the HTML
/// part and the inline resources form a `multipart/related`, wrapped in a `multipart/mixed`
/// together with the attachments.
pub fn to_message(message: &OutboundMessage) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(Mailbox::new(
            message.from.name.clone(),
            parse_address(message.from.address.as_str())?,
        ))
        .subject(message.subject.clone());

    for recipient in &message.to {
        builder = builder.to(Mailbox::new(None, parse_address(recipient.as_str())?));
    }

    let html = SinglePart::html(message.html_body.clone());

    let email = if message.inline.is_empty() && message.attachments.is_empty() {
        builder.singlepart(html)
    } else {
        let mut related = MultiPart::related().singlepart(html);
        for resource in &message.inline {
            related = related.singlepart(
                Attachment::new_inline_with_name(
                    resource.content_id.clone(),
                    resource.filename.clone(),
                )
                .body(resource.data.clone(), content_type(&resource.content_type)?),
            );
        }

        let mut mixed = MultiPart::mixed().multipart(related);
        for attachment in &message.attachments {
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type(&attachment.content_type)?),
            );
        }

        builder.multipart(mixed)
    };

    email.map_err(|e| TransportError::Permanent(format!("unable to build message: {}", e)))
}

fn parse_address(raw: &str) -> Result<Address, TransportError> {
    raw.parse()
        .map_err(|e: AddressError| TransportError::Permanent(format!("{}: {}", raw, e)))
}

fn content_type(raw: &str) -> Result<ContentType, TransportError> {
    ContentType::parse(raw)
        .map_err(|e| TransportError::Permanent(format!("invalid content type {}: {}", raw, e)))
}

/// Sorts a lettre error into the kinds the retry loop understands.
pub fn classify(err: SmtpError) -> TransportError {
    let description = err.to_string();
    let io_kind = io_error_kind(&err);

    if err.is_timeout()
        || matches!(
            io_kind,
            Some(io::ErrorKind::TimedOut) | Some(io::ErrorKind::WouldBlock)
        )
    {
        return TransportError::Timeout(description);
    }

    if let Some(code) = err.status() {
        return if err.is_transient() {
            TransportError::Transient(description)
        } else if matches!(u16::from(code), 530 | 534 | 535 | 538) {
            TransportError::AuthRejected(description)
        } else {
            TransportError::Permanent(description)
        };
    }

    match io_kind {
        Some(io::ErrorKind::ConnectionRefused) | None => TransportError::Permanent(description),
        Some(_) => TransportError::Network(description),
    }
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = Some(err);

    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }

        source = err.source();
    }

    None
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    use testresult::TestResult;

    use crate::domain::mail::{
        Attachment as FileAttachment, Credentials, EmailAddress, Endpoint, InlineResource, Sender,
    };

    use super::*;

    fn message() -> Result<OutboundMessage, crate::domain::mail::EmailAddressError> {
        Ok(OutboundMessage {
            from: Sender {
                name: Some("Internal Communication".to_string()),
                address: EmailAddress::new("s@x.com")?,
            },
            to: vec![EmailAddress::new("a@x.com")?, EmailAddress::new("b@x.com")?],
            subject: "Hi".to_string(),
            html_body: "<p>hello</p>".to_string(),
            inline: vec![],
            attachments: vec![],
        })
    }

    fn local(port: u16) -> Connection {
        Connection {
            endpoint: Endpoint {
                host: "127.0.0.1".to_string(),
                port,
                tls: TlsPolicy::TransportDefault,
            },
            credentials: None,
        }
    }

    /// A relay that answers every command with 250, except `MAIL FROM` which gets
    /// `mail_from_reply`. Returns everything the client sent.
    fn fake_relay(mail_from_reply: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut transcript = String::new();
            let mut in_data = false;
            let mut line = String::new();

            writer.write_all(b"220 relay.test ESMTP\r\n").unwrap();

            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                transcript.push_str(&line);

                if in_data {
                    if line == ".\r\n" {
                        in_data = false;
                        writer.write_all(b"250 2.0.0 queued\r\n").unwrap();
                    }
                    continue;
                }

                let command = line.to_ascii_uppercase();
                let reply = if command.starts_with("EHLO") {
                    "250-relay.test\r\n250 8BITMIME\r\n"
                } else if command.starts_with("MAIL FROM") {
                    mail_from_reply
                } else if command.starts_with("DATA") {
                    in_data = true;
                    "354 go ahead\r\n"
                } else if command.starts_with("QUIT") {
                    writer.write_all(b"221 bye\r\n").unwrap();
                    break;
                } else {
                    "250 ok\r\n"
                };

                if writer.write_all(reply.as_bytes()).is_err() {
                    break;
                }
            }

            transcript
        });

        (port, handle)
    }

    #[test]
    fn test_port_defaults_follow_the_mode() {
        let config = SMTPConfig::parse_from(["internalcom"]);
        assert_eq!(config.port(), RELAY_PORT);

        let config = SMTPConfig::parse_from(["internalcom", "--authent"]);
        assert_eq!(config.port(), SUBMISSION_PORT);

        let config = SMTPConfig::parse_from(["internalcom", "--authent", "--port", "2525"]);
        assert_eq!(config.port(), 2525);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = SMTPConfig::parse_from([
            "internalcom",
            "--retries",
            "10",
            "--retry-delay",
            "0",
            "--max-retry-delay",
            "0",
        ]);

        assert_eq!(config.retry_policy(), RetryPolicy::immediate(10));
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(SMTPConfig::try_parse_from(["internalcom", "--timeout", "0"]).is_err());

        let config = SMTPConfig::parse_from(["internalcom", "--timeout", "1"]);
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_single_part_message() -> TestResult {
        let email = to_message(&message()?)?;
        let formatted = String::from_utf8(email.formatted())?;

        assert!(formatted.contains("Subject: Hi"));
        assert!(formatted.contains("Internal Communication"));
        assert!(formatted.contains("<s@x.com>"));
        assert!(formatted.contains("a@x.com"));
        assert!(formatted.contains("b@x.com"));
        assert!(formatted.contains("Content-Type: text/html; charset=utf-8"));
        assert!(!formatted.contains("multipart"));

        Ok(())
    }

    #[test]
    fn test_multipart_message_with_logo_and_attachment() -> TestResult {
        let mut outbound = message()?;
        outbound.html_body =
            "<p>hello</p><br/><img src='cid:logo.png' alt='Logo' align='right'/>".to_string();
        outbound.inline.push(InlineResource {
            content_id: "logo.png".to_string(),
            filename: "logo.png".to_string(),
            content_type: "image/png".to_string(),
            data: b"\x89PNG".to_vec(),
        });
        outbound.attachments.push(FileAttachment {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.7".to_vec(),
        });

        let email = to_message(&outbound)?;
        let formatted = String::from_utf8(email.formatted())?;

        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("multipart/related"));
        assert!(formatted.contains("Content-ID: <logo.png>"));
        assert!(formatted.contains("Content-Disposition: inline; filename=\"logo.png\""));
        assert!(formatted.contains("Content-Type: image/png"));
        assert!(formatted.contains("filename=\"report.pdf\""));
        assert!(formatted.contains("Content-Type: application/pdf"));

        Ok(())
    }

    #[test]
    fn test_invalid_content_type_is_permanent() -> TestResult {
        let mut outbound = message()?;
        outbound.attachments.push(FileAttachment {
            filename: "data.bin".to_string(),
            content_type: "not a mime type".to_string(),
            data: vec![0, 1, 2],
        });

        assert!(matches!(
            to_message(&outbound),
            Err(TransportError::Permanent(_))
        ));

        Ok(())
    }

    #[test]
    fn test_mailer_for_authenticated_relay() -> TestResult {
        let connection = Connection {
            endpoint: Endpoint::select(true, SUBMISSION_PORT),
            credentials: Some(Credentials::new("user", "secret")),
        };

        SMTPMailer::new(Duration::from_secs(1)).mailer(&connection)?;

        Ok(())
    }

    #[test]
    fn test_send_through_relay() -> TestResult {
        let (port, relay) = fake_relay("250 2.1.0 sender ok\r\n");

        SMTPMailer::new(Duration::from_secs(5)).send(&local(port), &message()?)?;

        let transcript = relay.join().unwrap();
        assert!(transcript.contains("MAIL FROM:<s@x.com>"));
        assert!(transcript.contains("RCPT TO:<a@x.com>"));
        assert!(transcript.contains("RCPT TO:<b@x.com>"));
        assert!(transcript.contains("Subject: Hi"));
        assert!(!transcript.contains("AUTH"));

        Ok(())
    }

    #[test]
    fn test_permanent_reply_is_permanent() -> TestResult {
        let (port, relay) = fake_relay("550 5.7.1 relay access denied\r\n");

        let result = SMTPMailer::new(Duration::from_secs(5)).send(&local(port), &message()?);

        assert!(matches!(result, Err(TransportError::Permanent(_))));
        relay.join().unwrap();

        Ok(())
    }

    #[test]
    fn test_transient_reply_is_transient() -> TestResult {
        let (port, relay) = fake_relay("451 4.3.0 try again later\r\n");

        let result = SMTPMailer::new(Duration::from_secs(5)).send(&local(port), &message()?);

        assert!(matches!(result, Err(TransportError::Transient(_))));
        relay.join().unwrap();

        Ok(())
    }

    #[test]
    fn test_silent_relay_times_out() -> TestResult {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let result =
            SMTPMailer::new(Duration::from_millis(200)).send(&local(port), &message()?);

        assert!(matches!(result, Err(TransportError::Timeout(_))));
        drop(listener);

        Ok(())
    }

    #[test]
    fn test_refused_connection_is_permanent() -> TestResult {
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

        let result = SMTPMailer::new(Duration::from_secs(1)).send(&local(port), &message()?);

        assert!(matches!(result, Err(TransportError::Permanent(_))));

        Ok(())
    }
}
