//! Outbound message

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::domain::mail::{errors::BuildError, EmailAddress, MailRequest};

/// The `From` header of a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    /// Display name, if any
    pub name: Option<String>,

    /// The sender address
    pub address: EmailAddress,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// A resource embedded in the message and referenced from the body by content-id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineResource {
    /// The content-id, without angle brackets. Only ASCII letters, digits, `.`, `-` and `_`
    pub content_id: String,

    /// The file name of the resource
    pub filename: String,

    /// The MIME type of the resource
    pub content_type: String,

    /// The raw bytes of the resource
    pub data: Vec<u8>,
}

/// A file attached to the message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// The file name shown to the recipient
    pub filename: String,

    /// The MIME type of the file
    pub content_type: String,

    /// The raw bytes of the file
    pub data: Vec<u8>,
}

/// A fully composed email, ready to hand to a transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The sender
    pub from: Sender,

    /// The recipients, in the order given
    pub to: Vec<EmailAddress>,

    /// The subject of the email
    pub subject: String,

    /// The HTML body of the email
    pub html_body: String,

    /// Resources referenced from the body
    pub inline: Vec<InlineResource>,

    /// Attached files
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// Builds a message from a request.
    ///
    /// The logo and every attachment are read into memory here, so a missing file fails the
    /// build before any connection is made.
    ///
    /// # Arguments
    /// * `request` - The [`MailRequest`] to compose.
    ///
    /// # Returns
    /// - [`Ok`] with the [`OutboundMessage`] if the request is valid and every file is readable.
    /// - [`Err`] containing a [`BuildError`] otherwise.
    pub fn build(request: &MailRequest) -> Result<Self, BuildError> {
        request.validate()?;

        let from = Sender {
            name: request.from_name().map(str::to_string),
            address: request.sender_address()?,
        };

        let to = request.recipients()?;

        let mut inline = Vec::new();
        let html_body = if request.embed_logo {
            let logo = read_inline_resource(&request.logo_path)?;
            let html_body = format!(
                "{}<br/><img src='cid:{}' alt='Logo' align='right'/>",
                request.body, logo.content_id
            );
            inline.push(logo);
            html_body
        } else {
            request.body.clone()
        };

        let attachments = request
            .attachments()
            .iter()
            .enumerate()
            .map(|(i, path)| {
                info!("attaching {} - {}", i, path.display());
                read_attachment(path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            from,
            to,
            subject: request.subject.clone(),
            html_body,
            inline,
            attachments,
        })
    }
}

fn read_inline_resource(path: &Path) -> Result<InlineResource, BuildError> {
    let filename = file_name(path)?;

    Ok(InlineResource {
        content_id: content_id(&filename),
        filename,
        content_type: content_type(path),
        data: read_file(path)?,
    })
}

/// Derives a content-id from a file name. Characters that are not safe in both a `Content-ID`
/// header and a quoted `src` attribute are replaced with `_`.
fn content_id(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn read_attachment(path: &Path) -> Result<Attachment, BuildError> {
    Ok(Attachment {
        filename: file_name(path)?,
        content_type: content_type(path),
        data: read_file(path)?,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| attachment_error(path, source))
}

fn file_name(path: &Path) -> Result<String, BuildError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            attachment_error(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}

fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn attachment_error(path: &Path, source: io::Error) -> BuildError {
    BuildError::Attachment {
        path: PathBuf::from(path),
        source,
    }
}
