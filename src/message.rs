/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::path::{Path, PathBuf};

use mail_builder::MessageBuilder;

use crate::{input::Draft, smtp::Envelope, Error};

/// Recipient alias for the sender's own address.
pub const SENDER_ALIAS: &str = "DEBUG";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyFormat {
    #[default]
    Text,
    Html,
}

/// A file to be sent along with the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        let name = name.into();
        Attachment {
            path: PathBuf::from(&name),
            name,
            content_type: content_type.into(),
            contents: contents.into(),
        }
    }

    /// Reads the whole file and guesses its media type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|error| Error::Attachment {
            path: path.to_path_buf(),
            error,
        })?;

        Ok(Attachment {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            content_type: mime_guess::from_path(path)
                .first_raw()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            contents,
        })
    }
}

/// A fully built message, ready to be handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    recipients: Vec<String>,
    subject: String,
    body: String,
    format: BodyFormat,
    attachments: Vec<Attachment>,
}

/// Builds a message from a draft, reading every attachment. Nothing is
/// returned unless every attachment could be read.
pub fn build(
    draft: Draft,
    attachment_paths: &[PathBuf],
    format: BodyFormat,
) -> crate::Result<EmailMessage> {
    let attachments = attachment_paths
        .iter()
        .map(Attachment::from_path)
        .collect::<crate::Result<Vec<_>>>()?;

    EmailMessage::new(draft, attachments, format)
}

impl EmailMessage {
    pub fn new(
        draft: Draft,
        attachments: Vec<Attachment>,
        format: BodyFormat,
    ) -> crate::Result<Self> {
        let mut recipients: Vec<String> = Vec::with_capacity(draft.recipients.len());
        for addr in draft.recipients {
            let addr = addr.trim();
            if !addr.is_empty() && !recipients.iter().any(|r| r == addr) {
                recipients.push(addr.to_string());
            }
        }
        if recipients.is_empty() {
            return Err(Error::Input("No recipients specified".into()));
        }

        Ok(EmailMessage {
            recipients,
            subject: draft.subject,
            body: draft.body,
            format,
            attachments,
        })
    }

    /// The canned message sent by `test`, addressed to the sender.
    pub fn test_message(sender: &str, include_attachment: bool) -> Self {
        EmailMessage {
            recipients: vec![sender.to_string()],
            subject: "Test Email".to_string(),
            body: "This is a test.".to_string(),
            format: BodyFormat::Text,
            attachments: if include_attachment {
                vec![Attachment::new(
                    "test.txt",
                    "text/plain",
                    "This is a test attachment.\n",
                )]
            } else {
                Vec::new()
            },
        }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn format(&self) -> BodyFormat {
        self.format
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Envelope recipients, with the sender alias expanded.
    pub fn resolve_recipients<'x>(&'x self, sender: &'x str) -> Vec<&'x str> {
        if self.recipients.len() == 1 && self.recipients[0] == SENDER_ALIAS {
            vec![sender]
        } else {
            self.recipients.iter().map(String::as_str).collect()
        }
    }

    /// Renders the message as sent by `sender`.
    pub fn envelope(&self, sender: &str) -> std::io::Result<Envelope> {
        let recipients = self.resolve_recipients(sender);

        let mut builder = MessageBuilder::new()
            .from(sender)
            .to(recipients.clone())
            .subject(self.subject.as_str());
        builder = match self.format {
            BodyFormat::Text => builder.text_body(self.body.as_str()),
            BodyFormat::Html => builder.html_body(self.body.as_str()),
        };
        for attachment in &self.attachments {
            builder = builder.attachment(
                attachment.content_type.as_str(),
                attachment.name.as_str(),
                attachment.contents.as_slice(),
            );
        }

        Ok(Envelope::new(
            sender,
            recipients.into_iter().map(String::from),
            builder.write_to_vec()?,
        ))
    }
}
