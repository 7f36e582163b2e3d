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

use std::io;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

#[allow(clippy::large_enum_variant)]
#[doc(hidden)]
#[derive(Default)]
pub enum SmtpStream {
    Basic(TcpStream),
    Tls(TlsStream<TcpStream>),
    #[cfg(test)]
    Duplex(tokio::io::DuplexStream),
    #[default]
    None,
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "SMTP stream is closed")
}

impl SmtpStream {
    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SmtpStream::Basic(stream) => stream.read(buf).await,
            SmtpStream::Tls(stream) => stream.read(buf).await,
            #[cfg(test)]
            SmtpStream::Duplex(stream) => stream.read(buf).await,
            SmtpStream::None => Err(not_connected()),
        }
    }

    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.write_all(bytes).await,
            SmtpStream::Tls(stream) => stream.write_all(bytes).await,
            #[cfg(test)]
            SmtpStream::Duplex(stream) => stream.write_all(bytes).await,
            SmtpStream::None => Err(not_connected()),
        }
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.flush().await,
            SmtpStream::Tls(stream) => stream.flush().await,
            #[cfg(test)]
            SmtpStream::Duplex(stream) => stream.flush().await,
            SmtpStream::None => Err(not_connected()),
        }
    }

    /// Writes message data followed by the end-of-data marker, doubling
    /// any dot that starts a line.
    pub(crate) async fn write_message(&mut self, message: &[u8]) -> io::Result<()> {
        #[derive(Debug)]
        enum State {
            Cr,
            CrLf,
            Init,
        }

        let mut state = State::CrLf;
        let mut last_pos = 0;
        for (pos, byte) in message.iter().enumerate() {
            if *byte == b'.' && matches!(state, State::CrLf) {
                self.write_all(&message[last_pos..pos]).await?;
                self.write_all(b".").await?;
                last_pos = pos;
                state = State::Init;
            } else if *byte == b'\r' {
                state = State::Cr;
            } else if *byte == b'\n' && matches!(state, State::Cr) {
                state = State::CrLf;
            } else {
                state = State::Init;
            }
        }
        self.write_all(&message[last_pos..]).await?;
        if message.is_empty() || message.ends_with(b"\r\n") {
            self.write_all(b".\r\n").await?;
        } else {
            self.write_all(b"\r\n.\r\n").await?;
        }
        self.flush().await
    }
}
