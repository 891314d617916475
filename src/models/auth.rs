//! Login outcome types and the operator-facing notices they map to.

use serde::Serialize;

use crate::errors::ServiceError;
use crate::models::record::Record;

/// Route the host navigates to after a successful login.
pub const HOME_ROUTE: &str = "/home";

/// Message shown inline when the data service fails during login.
pub const SERVICE_ERROR_MESSAGE: &str = "Something went wrong.";

/// Message shown inline when no admin account matches.
pub const NO_MATCH_MESSAGE: &str = "Invalid username or password.";

/// Classified result of one login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthResult {
    /// The lookup query itself failed.
    ServiceError(ServiceError),
    /// The query succeeded but no account matched.
    NoMatch,
    /// At least one account matched; carries the first one.
    Match(Record),
}

impl AuthResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    /// Inline error message for the login form, `None` on a match.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::ServiceError(_) => Some(SERVICE_ERROR_MESSAGE),
            Self::NoMatch => Some(NO_MATCH_MESSAGE),
            Self::Match(_) => None,
        }
    }

    /// Route to navigate to, only set on a match.
    pub fn redirect(&self) -> Option<&'static str> {
        self.is_match().then_some(HOME_ROUTE)
    }

    /// Modal notice presented once the attempt resolves.
    pub fn notice(&self) -> Notice {
        match self {
            Self::ServiceError(_) => Notice {
                level: NoticeLevel::Error,
                title: "Error",
                text: "Something went wrong during authentication.",
            },
            Self::NoMatch => Notice {
                level: NoticeLevel::Warning,
                title: "Access Denied",
                text: NO_MATCH_MESSAGE,
            },
            Self::Match(_) => Notice {
                level: NoticeLevel::Success,
                title: "Success!",
                text: "Welcome to the admin dashboard.",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Blocking modal-style notice shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: &'static str,
    pub text: &'static str,
}

/// Observable login form state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginState {
    pub is_loading: bool,
    pub error: Option<String>,
}
