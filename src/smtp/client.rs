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

use smtp_proto::{response::parser::ResponseReceiver, Response};

use super::{AssertReply, Error, SmtpClient};

impl SmtpClient {
    pub(crate) async fn read(&mut self) -> super::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(Error::UnparseableReply);
            }

            match parser.parse(&mut buf[..br].iter()) {
                Ok(reply) => return Ok(reply),
                Err(err) => match err {
                    smtp_proto::Error::NeedsMoreData { .. } => (),
                    _ => {
                        return Err(Error::UnparseableReply);
                    }
                },
            }
        }
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> super::Result<Response<String>> {
        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(cmd.as_ref()).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Reads the server greeting and records the EHLO capabilities.
    pub async fn greet(&mut self) -> super::Result<()> {
        tokio::time::timeout(self.timeout, self.read())
            .await
            .map_err(|_| Error::Timeout)??
            .assert_positive_completion()?;
        self.capabilities = self.ehlo().await?;
        Ok(())
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(&mut self) -> super::Result<()> {
        self.cmd(b"QUIT\r\n").await?.assert_positive_completion()
    }
}

#[cfg(test)]
mod test {
    use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN, EXT_START_TLS};

    use crate::smtp::{
        test::{duplex_client, fake_server},
        Error,
    };

    #[tokio::test]
    async fn greeting_and_capabilities() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(fake_server(
            server,
            "220 smtp.example.com ESMTP ready\r\n",
            vec![
                "250-smtp.example.com\r\n250-STARTTLS\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME\r\n",
                "221 2.0.0 closing connection\r\n",
            ],
        ));

        let mut client = duplex_client(client);
        client.greet().await.unwrap();
        assert!(client.capabilities.has_capability(EXT_START_TLS));
        assert_ne!(client.capabilities.auth_mechanisms & AUTH_LOGIN, 0);
        assert_ne!(client.capabilities.auth_mechanisms & AUTH_PLAIN, 0);
        client.quit().await.unwrap();
        drop(client);

        assert_eq!(
            server.await.unwrap(),
            vec!["EHLO client.example.com\r\n", "QUIT\r\n"]
        );
    }

    #[tokio::test]
    async fn rejected_greeting() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(fake_server(
            server,
            "554 5.3.2 service unavailable\r\n",
            vec![],
        ));

        let mut client = duplex_client(client);
        match client.greet().await {
            Err(Error::UnexpectedReply(reply)) => assert_eq!(reply.code(), 554),
            other => panic!("Unexpected result {:?}", other.err()),
        }
        drop(client);
        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connection_closed() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        drop(server);

        let mut client = duplex_client(client);
        assert!(client.greet().await.is_err());
    }
}
