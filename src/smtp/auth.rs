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

use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD, Engine};
use smtp_proto::{Response, AUTH_LOGIN, AUTH_PLAIN};

use crate::secrets::Credentials;

use super::{Error, SmtpClient};

/// Authentication mechanism, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mechanism {
    Login,
    Plain,
}

impl Mechanism {
    pub const ALL: [Mechanism; 2] = [Mechanism::Login, Mechanism::Plain];

    fn flag(&self) -> u64 {
        match self {
            Mechanism::Login => AUTH_LOGIN,
            Mechanism::Plain => AUTH_PLAIN,
        }
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mechanism::Plain => write!(f, "PLAIN"),
            Mechanism::Login => write!(f, "LOGIN"),
        }
    }
}

impl Credentials {
    pub(crate) fn encode(&self, mechanism: Mechanism, challenge: &str) -> super::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                Mechanism::Plain => {
                    format!("\u{0}{}\u{0}{}", self.username(), self.password())
                }

                Mechanism::Login => {
                    let challenge = STANDARD
                        .decode(challenge.trim())
                        .map_err(|_| Error::InvalidChallenge)?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).ok_or(Error::InvalidChallenge)?)
                        || b"username".eq_ignore_ascii_case(
                            // Because Google makes its own standards
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        self.username()
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        self.password()
                    } else {
                        return Err(Error::InvalidChallenge);
                    }
                    .to_string()
                }
            }
            .as_bytes(),
        ))
    }
}

impl SmtpClient {
    /// Authenticates with the preferred mechanism among those advertised.
    /// Credentials are offered once.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> super::Result<()> {
        let mechanisms = self.capabilities.auth_mechanisms;

        match Mechanism::ALL
            .into_iter()
            .find(|mechanism| mechanisms & mechanism.flag() != 0)
        {
            Some(mechanism) => self.auth(mechanism, credentials).await,
            None => Err(Error::UnsupportedAuthMechanism),
        }
    }

    async fn auth(&mut self, mechanism: Mechanism, credentials: &Credentials) -> super::Result<()> {
        let mut reply = match mechanism {
            Mechanism::Plain => {
                self.cmd(format!("AUTH PLAIN {}\r\n", credentials.encode(mechanism, "")?))
                    .await?
            }
            Mechanism::Login => self.cmd(b"AUTH LOGIN\r\n").await?,
        };

        for _ in 0..3 {
            match reply.code() {
                334 => {
                    let response = credentials.encode(mechanism, reply.message())?;
                    reply = self.cmd(format!("{}\r\n", response)).await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(rejection(reply));
                }
            }
        }

        Err(rejection(reply))
    }
}

/// Only a refusal of the credentials themselves is an authentication
/// failure; temporary and protocol errors stay unexpected replies.
fn rejection(reply: Response<String>) -> Error {
    if matches!(reply.code(), 534 | 535) || reply.esc == [5, 7, 8] {
        Error::AuthenticationFailed(reply)
    } else {
        Error::UnexpectedReply(reply)
    }
}
