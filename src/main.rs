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

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use mail_submit::{
    debug, error, info,
    message::{self, BodyFormat, EmailMessage},
    secrets,
    smtp::{GMAIL_HOST, SUBMISSION_PORT},
    Credentials, Dispatcher, LogTarget, Logger, MessageInput, SmtpTransport,
    DEFAULT_PASSWORD_TAG, DEFAULT_USERNAME_TAG,
};

/// Send e-mail through an authenticated SMTP submission server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The log file for this application or stdout
    #[arg(long, global = true, default_value = "stdout")]
    log_file: LogTarget,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send an email with recipient(s), a subject and a body given on the
    /// command line or read from a file, with optional attachments
    Message(MessageArgs),

    /// Send a test email to the sender's own address
    Test(TestArgs),
}

#[derive(Args, Debug)]
struct MessageArgs {
    /// Read recipients (comma separated, first line), subject (second line)
    /// and body (remaining lines) from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// The email address(es) to send the email to
    #[arg(long, num_args = 1..)]
    recipients: Option<Vec<String>>,

    /// The subject of the email
    #[arg(long)]
    subject: Option<String>,

    /// The body of the email
    #[arg(long)]
    body: Option<String>,

    /// Files to attach to the email
    #[arg(long, num_args = 1..)]
    attachments: Vec<PathBuf>,

    /// Send the body as HTML
    #[arg(long)]
    html: bool,

    #[command(flatten)]
    account: AccountArgs,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Include a simple test attachment in the test email
    #[arg(long)]
    include_attachment: bool,

    #[command(flatten)]
    account: AccountArgs,
}

#[derive(Args, Debug)]
struct AccountArgs {
    /// The file containing credentials for the email sender
    #[arg(long)]
    secrets_file: PathBuf,

    /// The tag for the email username in the secrets file
    #[arg(long, default_value = DEFAULT_USERNAME_TAG)]
    username_tag: String,

    /// The tag for the email password in the secrets file
    #[arg(long, default_value = DEFAULT_PASSWORD_TAG)]
    password_tag: String,

    /// SMTP submission server
    #[arg(long, default_value = GMAIL_HOST)]
    smtp_host: String,

    /// SMTP submission port
    #[arg(long, default_value_t = SUBMISSION_PORT)]
    smtp_port: u16,
}

impl AccountArgs {
    fn credentials(&self, logger: &Logger) -> mail_submit::Result<Credentials> {
        info!(
            logger,
            "Loading secrets for '{}' from '{}'...",
            self.username_tag,
            self.secrets_file.display()
        );
        let credentials =
            secrets::resolve(&self.secrets_file, &self.username_tag, &self.password_tag)?;
        info!(logger, "Secrets loaded successfully!");
        Ok(credentials)
    }

    fn transport(&self) -> SmtpTransport {
        SmtpTransport::new(self.smtp_host.as_str(), self.smtp_port)
    }
}

fn prepare_message(
    logger: &Logger,
    args: MessageArgs,
) -> mail_submit::Result<(EmailMessage, Credentials)> {
    let input = MessageInput::from_args(args.file, args.recipients, args.subject, args.body)?;
    let credentials = args.account.credentials(logger)?;

    debug!(logger, "Reading message from {:?}", input);
    let draft = input.resolve()?;
    let message = message::build(
        draft,
        &args.attachments,
        if args.html {
            BodyFormat::Html
        } else {
            BodyFormat::Text
        },
    )?;

    Ok((message, credentials))
}

async fn send_message(logger: &Logger, args: MessageArgs) -> bool {
    let transport = args.account.transport();
    match prepare_message(logger, args) {
        Ok((message, credentials)) => Dispatcher::new(transport, logger)
            .send(message, credentials)
            .await
            .is_ok(),
        Err(err) => {
            error!(logger, "{}", err);
            false
        }
    }
}

async fn send_test(logger: &Logger, args: TestArgs) -> bool {
    match args.account.credentials(logger) {
        Ok(credentials) => Dispatcher::new(args.account.transport(), logger)
            .send_test(credentials, args.include_attachment)
            .await
            .is_ok(),
        Err(err) => {
            error!(logger, "{}", err);
            false
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger = match Logger::open(&cli.log_file) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Failed to open log file {:?}: {}", cli.log_file, err);
            return ExitCode::FAILURE;
        }
    };

    info!(logger, "====== INITIALIZING... ======");
    let success = match cli.command {
        Command::Message(args) => send_message(&logger, args).await,
        Command::Test(args) => send_test(&logger, args).await,
    };
    info!(logger, "====== TERMINATED ======");

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
