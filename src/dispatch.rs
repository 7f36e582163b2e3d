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

use crate::{
    logger::Logger,
    message::EmailMessage,
    secrets::Credentials,
    smtp::{self, Envelope},
    Error,
};

/// Something that can open a connection to a mail submission endpoint.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Connection: Connection;

    async fn connect(&self) -> smtp::Result<Self::Connection>;
}

/// An open connection to a mail submission endpoint.
#[allow(async_fn_in_trait)]
pub trait Connection {
    async fn start_tls(&mut self) -> smtp::Result<()>;

    async fn authenticate(&mut self, credentials: &Credentials) -> smtp::Result<()>;

    async fn send(&mut self, envelope: &Envelope) -> smtp::Result<()>;

    async fn close(&mut self) -> smtp::Result<()>;
}

/// Sends built messages through a [`Transport`].
pub struct Dispatcher<'x, T> {
    transport: T,
    logger: &'x Logger,
}

impl<'x, T: Transport> Dispatcher<'x, T> {
    pub fn new(transport: T, logger: &'x Logger) -> Self {
        Dispatcher { transport, logger }
    }

    /// Sends `message` authenticated as `credentials`. Failures are logged
    /// and returned.
    pub async fn send(&self, message: EmailMessage, credentials: Credentials) -> crate::Result<()> {
        info!(
            self.logger,
            "Creating new email to recipient(s): {}...",
            message
                .resolve_recipients(credentials.username())
                .join(", ")
        );

        match self.deliver(&message, &credentials).await {
            Ok(()) => {
                info!(self.logger, "Email sent successfully!");
                Ok(())
            }
            Err(err) => {
                error!(self.logger, "Failed to send email: {}", err);
                Err(err)
            }
        }
    }

    /// Sends the canned test message to the sender's own address.
    pub async fn send_test(
        &self,
        credentials: Credentials,
        include_attachment: bool,
    ) -> crate::Result<()> {
        info!(self.logger, "Attempting to send test email...");
        let message = EmailMessage::test_message(credentials.username(), include_attachment);
        self.send(message, credentials).await
    }

    async fn deliver(&self, message: &EmailMessage, credentials: &Credentials) -> crate::Result<()> {
        for attachment in message.attachments() {
            debug!(
                self.logger,
                "Attaching '{}' ({}, {} bytes) to email...",
                attachment.path.display(),
                attachment.content_type,
                attachment.contents.len()
            );
        }
        let envelope = message
            .envelope(credentials.username())
            .map_err(|err| Error::Transmission(smtp::Error::Io(err)))?;

        let mut connection = self.transport.connect().await?;
        let result = transmit(&mut connection, credentials, &envelope).await;
        let closed = connection.close().await;
        result?;

        if let Err(err) = closed {
            warning!(self.logger, "Failed to close connection: {}", err);
        }

        Ok(())
    }
}

async fn transmit<C: Connection>(
    connection: &mut C,
    credentials: &Credentials,
    envelope: &Envelope,
) -> smtp::Result<()> {
    connection.start_tls().await?;
    connection.authenticate(credentials).await?;
    connection.send(envelope).await
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, fs, path::Path, rc::Rc};

    use mail_parser::{MessageParser, MimeHeaders};

    use crate::{
        input::Draft,
        logger::{LogTarget, Logger},
        message::{self, BodyFormat},
        secrets::Credentials,
        smtp::{self, Envelope},
        Error,
    };

    use super::{Connection, Dispatcher, Transport};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Connect,
        StartTls,
        Authenticate,
        Send,
        Close,
    }

    #[derive(Default)]
    struct Recorder {
        steps: Vec<Step>,
        envelopes: Vec<Envelope>,
    }

    struct MockTransport {
        recorder: Rc<RefCell<Recorder>>,
        fail_at: Option<Step>,
    }

    struct MockConnection {
        recorder: Rc<RefCell<Recorder>>,
        fail_at: Option<Step>,
    }

    fn failure(step: Step) -> smtp::Error {
        match step {
            Step::Authenticate => smtp::Error::UnsupportedAuthMechanism,
            Step::Send => smtp::Error::Timeout,
            _ => smtp::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        }
    }

    impl MockConnection {
        fn step(&self, step: Step) -> smtp::Result<()> {
            self.recorder.borrow_mut().steps.push(step);
            if self.fail_at == Some(step) {
                Err(failure(step))
            } else {
                Ok(())
            }
        }
    }

    impl Transport for MockTransport {
        type Connection = MockConnection;

        async fn connect(&self) -> smtp::Result<MockConnection> {
            self.recorder.borrow_mut().steps.push(Step::Connect);
            if self.fail_at == Some(Step::Connect) {
                return Err(failure(Step::Connect));
            }
            Ok(MockConnection {
                recorder: self.recorder.clone(),
                fail_at: self.fail_at,
            })
        }
    }

    impl Connection for MockConnection {
        async fn start_tls(&mut self) -> smtp::Result<()> {
            self.step(Step::StartTls)
        }

        async fn authenticate(&mut self, credentials: &Credentials) -> smtp::Result<()> {
            assert_eq!(credentials.password(), "secret");
            self.step(Step::Authenticate)
        }

        async fn send(&mut self, envelope: &Envelope) -> smtp::Result<()> {
            self.recorder.borrow_mut().envelopes.push(envelope.clone());
            self.step(Step::Send)
        }

        async fn close(&mut self) -> smtp::Result<()> {
            self.step(Step::Close)
        }
    }

    fn mock(fail_at: Option<Step>) -> (MockTransport, Rc<RefCell<Recorder>>) {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        (
            MockTransport {
                recorder: recorder.clone(),
                fail_at,
            },
            recorder,
        )
    }

    fn credentials() -> Credentials {
        Credentials::new("me@gmail.com", "secret")
    }

    fn draft_message(recipients: &[&str]) -> message::EmailMessage {
        message::build(
            Draft {
                recipients: recipients.iter().map(|r| r.to_string()).collect(),
                subject: "Hi".to_string(),
                body: "Line1\nLine2".to_string(),
            },
            &[],
            BodyFormat::Text,
        )
        .unwrap()
    }

    fn log_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn send_success() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("send.log");
        let logger = Logger::open(&LogTarget::File(log.clone())).unwrap();
        let (transport, recorder) = mock(None);

        Dispatcher::new(transport, &logger)
            .send(draft_message(&["a@x.com", "b@x.com"]), credentials())
            .await
            .unwrap();

        let recorder = recorder.borrow();
        assert_eq!(
            recorder.steps,
            [
                Step::Connect,
                Step::StartTls,
                Step::Authenticate,
                Step::Send,
                Step::Close
            ]
        );
        assert_eq!(recorder.envelopes.len(), 1);
        assert_eq!(recorder.envelopes[0].mail_from, "me@gmail.com");
        assert_eq!(recorder.envelopes[0].rcpt_to, ["a@x.com", "b@x.com"]);

        let lines = log_lines(&log);
        assert!(lines[0].contains(" [INFO send "), "{}", lines[0]);
        assert!(lines[0].ends_with("] Creating new email to recipient(s): a@x.com, b@x.com..."));
        assert!(lines.last().unwrap().ends_with("] Email sent successfully!"));
        assert!(lines.iter().all(|line| !line.contains("secret")));
    }

    #[tokio::test]
    async fn connection_released_on_failure() {
        for (fail_at, auth_error) in [
            (Step::StartTls, false),
            (Step::Authenticate, true),
            (Step::Send, false),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let log = dir.path().join("send.log");
            let logger = Logger::open(&LogTarget::File(log.clone())).unwrap();
            let (transport, recorder) = mock(Some(fail_at));

            let err = Dispatcher::new(transport, &logger)
                .send(draft_message(&["a@x.com"]), credentials())
                .await
                .unwrap_err();
            if auth_error {
                assert!(matches!(err, Error::Authentication(_)), "{:?}", err);
            } else {
                assert!(matches!(err, Error::Transmission(_)), "{:?}", err);
            }

            let steps = recorder.borrow().steps.clone();
            assert_eq!(steps.first(), Some(&Step::Connect));
            assert_eq!(steps.last(), Some(&Step::Close), "{:?}", fail_at);
            assert_eq!(steps.iter().filter(|s| **s == Step::Close).count(), 1);

            let lines = log_lines(&log);
            assert!(
                lines.last().unwrap().contains(" [ERROR send "),
                "{}",
                lines.last().unwrap()
            );
        }
    }

    #[tokio::test]
    async fn connect_failure() {
        let logger = Logger::stdout();
        let (transport, recorder) = mock(Some(Step::Connect));

        assert!(matches!(
            Dispatcher::new(transport, &logger)
                .send(draft_message(&["a@x.com"]), credentials())
                .await,
            Err(Error::Transmission(smtp::Error::Io(_)))
        ));
        assert_eq!(recorder.borrow().steps, [Step::Connect]);
    }

    #[tokio::test]
    async fn close_failure_after_send() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("send.log");
        let logger = Logger::open(&LogTarget::File(log.clone())).unwrap();
        let (transport, recorder) = mock(Some(Step::Close));

        Dispatcher::new(transport, &logger)
            .send(draft_message(&["a@x.com"]), credentials())
            .await
            .unwrap();
        assert_eq!(recorder.borrow().envelopes.len(), 1);

        let lines = log_lines(&log);
        assert!(lines.iter().any(|line| line.contains("[WARNING ")));
        assert!(lines.last().unwrap().ends_with("] Email sent successfully!"));
    }

    #[tokio::test]
    async fn sender_alias() {
        let logger = Logger::stdout();
        let (transport, recorder) = mock(None);

        Dispatcher::new(transport, &logger)
            .send(draft_message(&["DEBUG"]), credentials())
            .await
            .unwrap();
        assert_eq!(recorder.borrow().envelopes[0].rcpt_to, ["me@gmail.com"]);
    }

    #[tokio::test]
    async fn send_test_message() {
        for include_attachment in [true, false] {
            let logger = Logger::stdout();
            let (transport, recorder) = mock(None);

            Dispatcher::new(transport, &logger)
                .send_test(credentials(), include_attachment)
                .await
                .unwrap();

            let recorder = recorder.borrow();
            assert_eq!(recorder.envelopes.len(), 1);
            let envelope = &recorder.envelopes[0];
            assert_eq!(envelope.mail_from, "me@gmail.com");
            assert_eq!(envelope.rcpt_to, ["me@gmail.com"]);

            let parsed = MessageParser::default().parse(&envelope.body).unwrap();
            assert_eq!(parsed.subject(), Some("Test Email"));
            if include_attachment {
                assert_eq!(parsed.attachment_count(), 1);
                let attachment = parsed.attachment(0).unwrap();
                assert_eq!(attachment.attachment_name(), Some("test.txt"));
                assert_eq!(
                    String::from_utf8_lossy(attachment.contents()).trim_end(),
                    "This is a test attachment."
                );
            } else {
                assert_eq!(parsed.attachment_count(), 0);
            }
        }
    }
}
