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

//! SMTP submission client: STARTTLS, LOGIN/PLAIN authentication and
//! message transmission.

use std::{fmt::Display, time::Duration};

use smtp_proto::{EhloResponse, Response};
use tokio_rustls::TlsConnector;

pub mod auth;
pub mod builder;
pub mod client;
pub mod ehlo;
pub mod envelope;
pub mod stream;
pub mod tls;

pub use envelope::Envelope;
use stream::SmtpStream;

pub const GMAIL_HOST: &str = "smtp.gmail.com";
pub const SUBMISSION_PORT: u16 = 587;

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// The server does not advertise STARTTLS.
    MissingStartTls,

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// Malformed authentication challenge.
    InvalidChallenge,

    /// Connection timeout.
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the server refused to authenticate us.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationFailed(_) | Error::UnsupportedAuthMechanism
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Tls(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => write!(f, "Unexpected reply: {} {}", e.code(), e.message()),
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {} {}", e.code(), e.message())
            }
            Error::MissingStartTls => write!(f, "STARTTLS extension unavailable"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::InvalidChallenge => write!(f, "Invalid authentication challenge"),
            Error::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Connection settings for an SMTP submission server.
#[derive(Clone)]
pub struct SmtpTransport {
    pub(crate) addr: String,
    pub(crate) timeout: Duration,
    pub(crate) tls_connector: TlsConnector,
    pub(crate) tls_hostname: String,
    pub(crate) local_host: String,
}

/// An open SMTP session.
pub struct SmtpClient {
    pub(crate) stream: SmtpStream,
    pub(crate) timeout: Duration,
    pub(crate) capabilities: EhloResponse<String>,
    pub(crate) tls_connector: TlsConnector,
    pub(crate) tls_hostname: String,
    pub(crate) local_host: String,
}

pub trait AssertReply: Sized {
    fn is_positive_completion(&self) -> bool;
    fn assert_positive_completion(self) -> Result<()>;
    fn assert_code(self, code: u16) -> Result<()>;
}

impl AssertReply for Response<String> {
    /// Returns `true` if the reply is a positive completion.
    #[inline(always)]
    fn is_positive_completion(&self) -> bool {
        (200..=299).contains(&self.code())
    }

    /// Returns Ok if the reply has the specified status code.
    #[inline(always)]
    fn assert_code(self, code: u16) -> Result<()> {
        if self.code() == code {
            Ok(())
        } else {
            Err(Error::UnexpectedReply(self))
        }
    }

    /// Returns Ok if the reply is a positive completion.
    #[inline(always)]
    fn assert_positive_completion(self) -> Result<()> {
        if self.is_positive_completion() {
            Ok(())
        } else {
            Err(Error::UnexpectedReply(self))
        }
    }
}
