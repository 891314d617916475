//! Login credential submitted by the operator.

use std::fmt;

use serde::Deserialize;
use validator::Validate;

use crate::errors::AuthError;

/// Username/password pair for a single login attempt.
///
/// Created per submit and dropped once the attempt resolves; never stored.
#[derive(Clone, Deserialize, Validate)]
pub struct Credential {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reject credentials with an empty username or password.
    pub fn ensure_complete(&self) -> Result<(), AuthError> {
        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            messages.sort();
            AuthError::InvalidCredential(messages.join(", "))
        })
    }
}

// Password stays out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
