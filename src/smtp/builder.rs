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

use std::time::Duration;

use smtp_proto::EhloResponse;
use tokio::net::TcpStream;

use crate::{
    dispatch::{Connection, Transport},
    secrets::Credentials,
};

use super::{
    stream::SmtpStream, tls::build_tls_connector, Envelope, Error, SmtpClient, SmtpTransport,
    GMAIL_HOST, SUBMISSION_PORT,
};

impl SmtpTransport {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        let hostname = hostname.into();
        SmtpTransport {
            addr: format!("{}:{}", hostname, port),
            timeout: Duration::from_secs(60 * 60),
            tls_connector: build_tls_connector(),
            tls_hostname: hostname,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Gmail's submission endpoint.
    pub fn gmail() -> Self {
        Self::new(GMAIL_HOST, SUBMISSION_PORT)
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connects over clear text and reads the greeting and capabilities.
    pub async fn connect(&self) -> super::Result<SmtpClient> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| Error::Timeout)??;

        let mut client = SmtpClient {
            stream: SmtpStream::Basic(stream),
            timeout: self.timeout,
            capabilities: EhloResponse::default(),
            tls_connector: self.tls_connector.clone(),
            tls_hostname: self.tls_hostname.clone(),
            local_host: self.local_host.clone(),
        };
        client.greet().await?;

        Ok(client)
    }
}

impl Transport for SmtpTransport {
    type Connection = SmtpClient;

    async fn connect(&self) -> super::Result<SmtpClient> {
        SmtpTransport::connect(self).await
    }
}

impl Connection for SmtpClient {
    async fn start_tls(&mut self) -> super::Result<()> {
        SmtpClient::start_tls(self).await
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> super::Result<()> {
        SmtpClient::authenticate(self, credentials).await
    }

    async fn send(&mut self, envelope: &Envelope) -> super::Result<()> {
        SmtpClient::send(self, envelope).await
    }

    async fn close(&mut self) -> super::Result<()> {
        let result = self.quit().await;
        self.stream = SmtpStream::None;
        result
    }
}
