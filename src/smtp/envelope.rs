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

use super::{AssertReply, Error, SmtpClient};

/// A rendered message together with its SMTP envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(
        mail_from: impl Into<String>,
        rcpt_to: impl IntoIterator<Item = impl Into<String>>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Envelope {
            mail_from: mail_from.into(),
            rcpt_to: rcpt_to.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }
}

impl SmtpClient {
    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> super::Result<()> {
        self.cmd(format!("MAIL FROM:<{}>\r\n", addr))
            .await?
            .assert_positive_completion()
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> super::Result<()> {
        self.cmd(format!("RCPT TO:<{}>\r\n", addr))
            .await?
            .assert_positive_completion()
    }

    /// Sends a DATA command to the server.
    pub async fn data(&mut self, message: impl AsRef<[u8]>) -> super::Result<()> {
        self.cmd(b"DATA\r\n").await?.assert_code(354)?;
        tokio::time::timeout(self.timeout, async {
            // Write message
            self.stream.write_message(message.as_ref()).await?;
            self.read().await
        })
        .await
        .map_err(|_| Error::Timeout)??
        .assert_positive_completion()
    }

    /// Transmits a message.
    pub async fn send(&mut self, envelope: &Envelope) -> super::Result<()> {
        self.mail_from(&envelope.mail_from).await?;
        for rcpt in &envelope.rcpt_to {
            self.rcpt_to(rcpt).await?;
        }
        self.data(&envelope.body).await
    }
}

#[cfg(test)]
mod test {
    use crate::smtp::{
        test::{duplex_client, fake_server},
        Error,
    };

    use super::Envelope;

    #[tokio::test]
    async fn send_message() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(fake_server(
            server,
            "220 mx ready\r\n",
            vec![
                "250-mx\r\n250 8BITMIME\r\n",
                "250 2.1.0 OK\r\n",
                "250 2.1.5 OK\r\n",
                "250 2.1.5 OK\r\n",
                "354 Go ahead\r\n",
                "250 2.0.0 OK queued\r\n",
            ],
        ));

        let mut client = duplex_client(client);
        client.greet().await.unwrap();
        client
            .send(&Envelope::new(
                "john@example.com",
                ["a@x.com", "b@x.com"],
                "Subject: Hi\r\n\r\n.hidden\r\nbye\r\n",
            ))
            .await
            .unwrap();
        drop(client);

        assert_eq!(
            server.await.unwrap(),
            vec![
                "EHLO client.example.com\r\n",
                "MAIL FROM:<john@example.com>\r\n",
                "RCPT TO:<a@x.com>\r\n",
                "RCPT TO:<b@x.com>\r\n",
                "DATA\r\n",
                "Subject: Hi\r\n\r\n..hidden\r\nbye\r\n.\r\n",
            ]
        );
    }

    #[tokio::test]
    async fn recipient_rejected() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(fake_server(
            server,
            "220 mx ready\r\n",
            vec![
                "250 mx\r\n",
                "250 2.1.0 OK\r\n",
                "550 5.1.1 No such user\r\n",
            ],
        ));

        let mut client = duplex_client(client);
        client.greet().await.unwrap();
        let err = client
            .send(&Envelope::new("john@example.com", ["nobody@x.com"], "body"))
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::UnexpectedReply(reply) if reply.code() == 550));
        assert!(matches!(
            crate::Error::from(err),
            crate::Error::Transmission(_)
        ));
        drop(client);

        assert_eq!(server.await.unwrap().len(), 3);
    }
}
