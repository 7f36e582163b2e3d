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

use std::path::PathBuf;

use crate::Error;

/// Recipients, subject and body of a message that has not been built yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Where the message contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageInput {
    /// Structured file: recipients on line 1, subject on line 2, body after.
    File(PathBuf),

    /// Values given directly.
    Direct {
        recipients: Vec<String>,
        subject: Option<String>,
        body: Option<String>,
    },
}

impl MessageInput {
    /// Picks the input mode from command line values. A file excludes every
    /// direct value, and one of the two modes must be used.
    pub fn from_args(
        file: Option<PathBuf>,
        recipients: Option<Vec<String>>,
        subject: Option<String>,
        body: Option<String>,
    ) -> crate::Result<Self> {
        match (file, recipients) {
            (Some(file), None) if subject.is_none() && body.is_none() => {
                Ok(MessageInput::File(file))
            }
            (Some(_), _) => Err(Error::Input(
                "--file cannot be combined with --recipients, --subject or --body".into(),
            )),
            (None, Some(recipients)) => Ok(MessageInput::Direct {
                recipients,
                subject,
                body,
            }),
            (None, None) => Err(Error::Input(
                "Recipients must be specified either in a file or with --recipients".into(),
            )),
        }
    }

    pub fn resolve(self) -> crate::Result<Draft> {
        match self {
            MessageInput::File(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|err| {
                    Error::Input(format!(
                        "Failed to read message file '{}': {}",
                        path.display(),
                        err
                    ))
                })?;
                parse_structured(&contents).map_err(|err| match err {
                    Error::Input(reason) => {
                        Error::Input(format!("{} in '{}'", reason, path.display()))
                    }
                    err => err,
                })
            }
            MessageInput::Direct {
                recipients,
                subject,
                body,
            } => {
                if recipients.iter().all(|addr| addr.trim().is_empty()) {
                    return Err(Error::Input("No recipients specified".into()));
                }

                Ok(Draft {
                    recipients,
                    subject: subject.unwrap_or_default(),
                    body: body.unwrap_or_default(),
                })
            }
        }
    }
}

/// Parses the structured message format. The body is everything after the
/// second line, kept verbatim.
pub fn parse_structured(contents: &str) -> crate::Result<Draft> {
    let (recipients, subject, body) = match contents.split_once('\n') {
        Some((recipients, rest)) if !rest.is_empty() => {
            let (subject, body) = rest.split_once('\n').unwrap_or((rest, ""));
            (recipients, subject, body)
        }
        _ => {
            return Err(Error::Input(
                "Expected recipients on the first line and a subject on the second".into(),
            ))
        }
    };

    let recipients = recipients
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect::<Vec<_>>();
    if recipients.is_empty() {
        return Err(Error::Input("No recipients found on the first line".into()));
    }

    Ok(Draft {
        recipients,
        subject: subject.trim().to_string(),
        body: body.to_string(),
    })
}
