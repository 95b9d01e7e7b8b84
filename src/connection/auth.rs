//! Store credentials.
//!
//! Credentials are either a password or a bearer token. Secrets never appear
//! in `Debug` output.

use std::fmt;

/// Header carrying the user name for password authentication.
pub const USER_HEADER: &str = "X-ClickHouse-User";

/// Header carrying the password for password authentication.
pub const KEY_HEADER: &str = "X-ClickHouse-Key";

/// Header carrying a bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Secret presented to the store.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    Token(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

/// User name plus secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    credential: Credential,
}

impl Credentials {
    /// Password credentials.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: Credential::Password(password.into()),
        }
    }

    /// Bearer-token credentials.
    pub fn token(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: Credential::Token(token.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Whether a bearer token is used.
    pub fn is_token(&self) -> bool {
        matches!(self.credential, Credential::Token(_))
    }

    /// HTTP headers that authenticate a request with these credentials.
    ///
    /// Password credentials send the user and key headers; token credentials
    /// send `Authorization: Bearer <token>`.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match &self.credential {
            Credential::Password(password) => vec![
                (USER_HEADER, self.username.clone()),
                (KEY_HEADER, password.clone()),
            ],
            Credential::Token(token) => {
                vec![(AUTHORIZATION_HEADER, format!("Bearer {token}"))]
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("credential", &self.credential)
            .finish()
    }
}
