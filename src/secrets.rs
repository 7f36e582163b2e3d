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

use std::{collections::HashMap, fmt::Debug, path::Path};

use crate::Error;

pub const DEFAULT_USERNAME_TAG: &str = "gmail_username";
pub const DEFAULT_PASSWORD_TAG: &str = "gmail_password";

/// SMTP login. The password is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Flat `tag: value` secrets source.
///
/// Blank lines and lines starting with `#` are skipped. Keys and values are
/// trimmed, and a key with an empty value is treated as absent.
#[derive(Default)]
pub struct Secrets {
    origin: String,
    values: HashMap<String, String>,
}

impl Secrets {
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!(
                "Failed to read secrets file '{}': {}",
                path.display(),
                err
            ))
        })?;

        Self::parse(path.display().to_string(), &contents)
    }

    pub fn parse(origin: impl Into<String>, contents: &str) -> crate::Result<Self> {
        let origin = origin.into();
        let mut values = HashMap::new();

        for (num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once(':').ok_or_else(|| {
                Error::Config(format!(
                    "Malformed line {} in '{}': expected 'tag: value'",
                    num + 1,
                    origin
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());
            if !value.is_empty() {
                values.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Secrets { origin, values })
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.values.get(tag).map(String::as_str)
    }

    /// Looks up both tags. Fails if either one is missing.
    pub fn resolve(&self, username_tag: &str, password_tag: &str) -> crate::Result<Credentials> {
        let lookup = |kind: &str, tag: &str| {
            self.get(tag).ok_or_else(|| {
                Error::Config(format!(
                    "{} tag '{}' not found in '{}'",
                    kind, tag, self.origin
                ))
            })
        };

        Ok(Credentials::new(
            lookup("Username", username_tag)?,
            lookup("Password", password_tag)?,
        ))
    }
}

/// Loads `source` and resolves the two tags against it.
pub fn resolve(
    source: impl AsRef<Path>,
    username_tag: &str,
    password_tag: &str,
) -> crate::Result<Credentials> {
    Secrets::load(source)?.resolve(username_tag, password_tag)
}

#[cfg(test)]
mod test {
    use std::fs;

    use crate::Error;

    use super::{resolve, Credentials, Secrets, DEFAULT_PASSWORD_TAG, DEFAULT_USERNAME_TAG};

    #[test]
    fn resolve_default_tags() {
        let secrets = Secrets::parse(
            "secrets.txt",
            concat!(
                "# Gmail app password\n",
                "gmail_username: john@gmail.com\n",
                "\n",
                "gmail_password :  abcd efgh ijkl mnop  \n",
                "other_service: unused\n",
            ),
        )
        .unwrap();

        assert_eq!(
            secrets
                .resolve(DEFAULT_USERNAME_TAG, DEFAULT_PASSWORD_TAG)
                .unwrap(),
            Credentials::new("john@gmail.com", "abcd efgh ijkl mnop")
        );
    }

    #[test]
    fn exact_key_match() {
        let secrets = Secrets::parse(
            "secrets.txt",
            "gmail_username_old: old@gmail.com\nwork_user: jane@work.com\nwork_pass: hunter2\n",
        )
        .unwrap();

        assert!(matches!(
            secrets.resolve(DEFAULT_USERNAME_TAG, "work_pass"),
            Err(Error::Config(_))
        ));
        assert_eq!(
            secrets.resolve("work_user", "work_pass").unwrap(),
            Credentials::new("jane@work.com", "hunter2")
        );
    }

    #[test]
    fn missing_tags() {
        for contents in [
            "gmail_username: john@gmail.com\n",
            "gmail_password: secret\n",
            "gmail_username: john@gmail.com\ngmail_password:\n",
            "",
        ] {
            match Secrets::parse("secrets.txt", contents)
                .unwrap()
                .resolve(DEFAULT_USERNAME_TAG, DEFAULT_PASSWORD_TAG)
            {
                Err(Error::Config(message)) => assert!(message.contains("secrets.txt")),
                other => panic!("Unexpected result {:?} for {:?}", other, contents),
            }
        }
    }

    #[test]
    fn malformed_source() {
        assert!(matches!(
            Secrets::parse("secrets.txt", "gmail_username john@gmail.com\n"),
            Err(Error::Config(message)) if message.contains("line 1")
        ));
    }

    #[test]
    fn resolve_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.txt");
        fs::write(&path, "gmail_username: john@gmail.com\ngmail_password: p4ss:w0rd\n").unwrap();

        let credentials = resolve(&path, DEFAULT_USERNAME_TAG, DEFAULT_PASSWORD_TAG).unwrap();
        assert_eq!(credentials.username(), "john@gmail.com");
        assert_eq!(credentials.password(), "p4ss:w0rd");
        assert!(!format!("{:?}", credentials).contains("p4ss"));

        assert!(matches!(
            resolve(dir.path().join("missing.txt"), DEFAULT_USERNAME_TAG, DEFAULT_PASSWORD_TAG),
            Err(Error::Config(_))
        ));
    }
}
