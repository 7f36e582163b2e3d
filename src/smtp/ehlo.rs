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

use smtp_proto::{
    response::parser::{ResponseReceiver, MAX_RESPONSE_LENGTH},
    EhloResponse,
};

use super::{Error, SmtpClient};

impl SmtpClient {
    /// Sends a EHLO command to the server.
    pub async fn ehlo(&mut self) -> super::Result<EhloResponse<String>> {
        let command = format!("EHLO {}\r\n", self.local_host);
        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(command.as_bytes()).await?;
            self.stream.flush().await?;
            self.read_ehlo().await
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    async fn read_ehlo(&mut self) -> super::Result<EhloResponse<String>> {
        let mut buf = vec![0u8; 1024];
        let mut pending = Vec::with_capacity(0);

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(Error::UnparseableReply);
            } else if pending.len() + br >= MAX_RESPONSE_LENGTH {
                return Err(Error::UnparseableReply);
            }
            pending.extend_from_slice(&buf[..br]);

            let mut iter = pending.iter();
            match EhloResponse::parse(&mut iter) {
                Ok(reply) => return Ok(reply),
                Err(smtp_proto::Error::NeedsMoreData { .. }) => (),
                Err(smtp_proto::Error::InvalidResponse { code }) => {
                    match ResponseReceiver::from_code(code).parse(&mut iter) {
                        Ok(response) => {
                            return Err(Error::UnexpectedReply(response));
                        }
                        Err(smtp_proto::Error::NeedsMoreData { .. }) => (),
                        Err(_) => return Err(Error::UnparseableReply),
                    }
                }
                Err(_) => {
                    return Err(Error::UnparseableReply);
                }
            }
        }
    }
}
