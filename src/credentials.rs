//! Credential sources for registry authentication
//!
//! Basic (or anonymous) credentials are presented only to the token-exchange
//! endpoint; ordinary API endpoints only ever see the Bearer token obtained
//! from that exchange.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// A source of `Authorization` header values for the token exchange.
///
/// The value is re-read on every exchange, so implementations may rotate the
/// underlying credential between calls.
pub trait BasicCredential: Send + Sync {
    fn authorization(&self) -> String;
}

/// Username/password pair encoded as HTTP Basic authentication.
#[derive(Debug, Clone)]
pub struct UserPassword {
    username: String,
    password: String,
}

impl UserPassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl BasicCredential for UserPassword {
    fn authorization(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

/// Anonymous access: the exchange endpoint sees an empty credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl BasicCredential for Anonymous {
    fn authorization(&self) -> String {
        String::new()
    }
}

/// A short-lived token obtained from the exchange endpoint.
///
/// The registry transport holds exactly one current `Bearer` and replaces it
/// wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct Bearer {
    token: String,
}

impl Bearer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_password_encoding() {
        let creds = UserPassword::new("user", "secret");
        // base64("user:secret")
        assert_eq!(creds.authorization(), "Basic dXNlcjpzZWNyZXQ=");
        assert_eq!(creds.username(), "user");
    }

    #[test]
    fn test_anonymous_is_empty() {
        assert_eq!(Anonymous.authorization(), "");
    }

    #[test]
    fn test_bearer_header_value() {
        let bearer = Bearer::new("abc123");
        assert_eq!(bearer.token(), "abc123");
        assert_eq!(bearer.authorization(), "Bearer abc123");
    }
}
