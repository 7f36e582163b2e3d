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

use std::{convert::TryFrom, io, sync::Arc};

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use smtp_proto::EXT_START_TLS;
use tokio_rustls::TlsConnector;

use super::{stream::SmtpStream, AssertReply, Error, SmtpClient};

impl SmtpClient {
    /// Upgrade the connection to TLS and refresh the capabilities.
    pub async fn start_tls(&mut self) -> super::Result<()> {
        if !self.capabilities.has_capability(EXT_START_TLS) {
            return Err(Error::MissingStartTls);
        } else if !matches!(self.stream, SmtpStream::Basic(_)) {
            return Err(not_upgradable());
        }

        let server_name = ServerName::try_from(self.tls_hostname.as_str())
            .map_err(|_| Error::InvalidTLSName)?
            .to_owned();

        // Send STARTTLS command
        self.cmd(b"STARTTLS\r\n")
            .await?
            .assert_positive_completion()?;

        let tcp = match std::mem::take(&mut self.stream) {
            SmtpStream::Basic(tcp) => tcp,
            other => {
                self.stream = other;
                return Err(not_upgradable());
            }
        };
        let tls = tokio::time::timeout(self.timeout, self.tls_connector.connect(server_name, tcp))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(tls_error)?;
        self.stream = SmtpStream::Tls(tls);

        self.capabilities = self.ehlo().await?;
        Ok(())
    }
}

fn not_upgradable() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "Only plain TCP connections can be upgraded to TLS",
    ))
}

fn tls_error(err: io::Error) -> Error {
    let kind = err.kind();
    if let Some(inner) = err.into_inner() {
        match inner.downcast::<rustls::Error>() {
            Ok(error) => Error::Tls(error),
            Err(error) => Error::Io(io::Error::new(kind, error)),
        }
    } else {
        Error::Io(io::Error::new(kind, "Unspecified"))
    }
}

pub fn build_tls_connector() -> TlsConnector {
    let mut root_cert_store = RootCertStore::empty();
    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
