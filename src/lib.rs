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

//! # mail-submit
//!
//! _mail-submit_ sends e-mail messages through an authenticated SMTP submission
//! server (Gmail by default). It includes the following features:
//!
//! - Message input either from discrete values or from a structured file
//!   (recipients on the first line, subject on the second, body afterwards).
//! - Full **MIME** assembly with any number of file attachments, media types
//!   inferred from the file extension.
//! - Credentials looked up by tag from a flat `tag: value` secrets file.
//! - SMTP submission (_RFC 6409_) upgraded with **STARTTLS** (_RFC 3207_) and
//!   authenticated with LOGIN or PLAIN (_RFC 4954_).
//! - A structured logger writing `timestamp [LEVEL caller line] message`
//!   records to standard output or to a file.
//!
//! ## Usage Example
//!
//! ```rust
//!     let logger = Logger::open(&LogTarget::Stdout)?;
//!
//!     let draft = MessageInput::File("message.txt".into()).resolve()?;
//!     let message = message::build(draft, &["report.pdf".into()], BodyFormat::Text)?;
//!     let credentials = Secrets::load("secrets.txt")?
//!         .resolve(DEFAULT_USERNAME_TAG, DEFAULT_PASSWORD_TAG)?;
//!
//!     Dispatcher::new(SmtpTransport::gmail(), &logger)
//!         .send(message, credentials)
//!         .await?;
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

#[macro_use]
pub mod logger;
pub mod dispatch;
pub mod input;
pub mod message;
pub mod secrets;
#[forbid(unsafe_code)]
pub mod smtp;

use std::{fmt::Display, path::PathBuf};

pub use dispatch::{Connection, Dispatcher, Transport};
pub use input::{Draft, MessageInput};
pub use logger::{Level, LogTarget, Logger};
pub use mail_builder;
pub use message::{Attachment, BodyFormat, EmailMessage};
pub use secrets::{Credentials, Secrets, DEFAULT_PASSWORD_TAG, DEFAULT_USERNAME_TAG};
pub use smtp::SmtpTransport;

#[derive(Debug)]
pub enum Error {
    /// Secrets source unreadable, malformed or missing a tag.
    Config(String),

    /// Malformed or insufficient message input.
    Input(String),

    /// Attachment could not be read.
    Attachment {
        path: PathBuf,
        error: std::io::Error,
    },

    /// The submission server rejected the credentials.
    Authentication(smtp::Error),

    /// Any other transport failure.
    Transmission(smtp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Attachment { error, .. } => Some(error),
            Error::Authentication(err) | Error::Transmission(err) => Some(err),
            Error::Config(_) | Error::Input(_) => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Input(e) => write!(f, "Input error: {}", e),
            Error::Attachment { path, error } => write!(
                f,
                "Failed to read attachment '{}': {}",
                path.display(),
                error
            ),
            Error::Authentication(e) => write!(f, "Authentication error: {}", e),
            Error::Transmission(e) => write!(f, "Transmission error: {}", e),
        }
    }
}

impl From<smtp::Error> for Error {
    fn from(err: smtp::Error) -> Self {
        if err.is_auth_failure() {
            Error::Authentication(err)
        } else {
            Error::Transmission(err)
        }
    }
}
