//! Login gate: one lookup per attempt, classified into a terminal outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::errors::AuthError;
use crate::models::auth::{AuthResult, LoginState};
use crate::models::credential::Credential;
use crate::services::remote::RemoteDataService;
use crate::services::verifier::CredentialVerifier;

/// Buffered completion events per subscriber before older ones are dropped.
const OUTCOME_BUFFER: usize = 16;

/// Runs login attempts against the admin table, at most one at a time.
pub struct Authenticator {
    service: Arc<dyn RemoteDataService>,
    verifier: Box<dyn CredentialVerifier>,
    table: String,
    in_flight: AtomicBool,
    state: watch::Sender<LoginState>,
    outcomes: broadcast::Sender<AuthResult>,
}

/// Clears the in-flight guard and loading flag even if the attempt is dropped mid-query.
struct InFlight<'a>(&'a Authenticator);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.state.send_if_modified(|s| std::mem::replace(&mut s.is_loading, false));
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl Authenticator {
    pub fn new(
        service: Arc<dyn RemoteDataService>,
        verifier: Box<dyn CredentialVerifier>,
        table: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(LoginState::default());
        let (outcomes, _) = broadcast::channel(OUTCOME_BUFFER);
        Self {
            service,
            verifier,
            table: table.into(),
            in_flight: AtomicBool::new(false),
            state,
            outcomes,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Receiver that observes loading/error changes.
    pub fn watch_state(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    /// Completion events, one per resolved attempt.
    pub fn outcomes(&self) -> broadcast::Receiver<AuthResult> {
        self.outcomes.subscribe()
    }

    /// Run one login attempt.
    ///
    /// Returns `Err` only when the attempt is refused before querying: an
    /// incomplete credential, or another attempt still pending. Service
    /// failures are reported as [`AuthResult::ServiceError`].
    pub async fn attempt_login(&self, credential: Credential) -> Result<AuthResult, AuthError> {
        credential.ensure_complete()?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(username = %credential.username, "Login submit ignored, attempt in flight");
            return Err(AuthError::AttemptInFlight);
        }
        let _guard = InFlight(self);

        self.state.send_modify(|s| s.is_loading = true);

        let filters = self.verifier.lookup_filters(&credential);
        let result = match self.service.query(&self.table, &filters).await {
            Err(e) => {
                tracing::error!(error = %e, table = %self.table, "Login lookup failed");
                AuthResult::ServiceError(e)
            }
            Ok(records) => {
                if records.len() > 1 {
                    tracing::warn!(
                        username = %credential.username,
                        matches = records.len(),
                        "Several admin records match one credential, using the first"
                    );
                }
                match records
                    .into_iter()
                    .find(|r| self.verifier.accepts(&credential, r))
                {
                    Some(record) => AuthResult::Match(record),
                    None => AuthResult::NoMatch,
                }
            }
        };

        match &result {
            AuthResult::Match(_) => {
                tracing::info!(username = %credential.username, "Admin login succeeded")
            }
            AuthResult::NoMatch => {
                tracing::info!(username = %credential.username, "Admin login rejected")
            }
            AuthResult::ServiceError(_) => {}
        }

        self.state.send_modify(|s| {
            s.is_loading = false;
            s.error = result.error_message().map(str::to_string);
        });

        // No listeners is fine; the caller also gets the result directly.
        let _ = self.outcomes.send(result.clone());

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::services::memory::MemoryDataService;
    use crate::services::verifier::{hash_password, Argon2Verifier, PlaintextVerifier};
    use crate::test_support::GatedService;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready};

    fn store() -> Arc<MemoryDataService> {
        Arc::new(
            MemoryDataService::new()
                .with_rows("admin", vec![json!({"username": "admin", "password": "correct"})]),
        )
    }

    fn authenticator(service: Arc<dyn RemoteDataService>) -> Authenticator {
        Authenticator::new(service, Box::new(PlaintextVerifier), "admin")
    }

    #[tokio::test]
    async fn wrong_password_is_no_match() {
        let store = store();
        let auth = authenticator(store.clone());

        let result = assert_ok!(auth.attempt_login(Credential::new("admin", "wrong")).await);

        assert_eq!(result, AuthResult::NoMatch);
        assert_eq!(auth.error().as_deref(), Some("Invalid username or password."));
        assert!(!auth.is_loading());
        assert_eq!(store.calls().query, 1);
    }

    #[tokio::test]
    async fn unknown_user_never_matches() {
        let auth = authenticator(store());
        for (user, pass) in [("root", "correct"), ("", "x"), ("admin ", "correct")] {
            if let Ok(result) = auth.attempt_login(Credential::new(user, pass)).await {
                assert!(!result.is_match(), "{user:?} should not match");
            }
        }
    }

    #[tokio::test]
    async fn correct_credential_matches_first_record() {
        let auth = authenticator(store());
        let mut outcomes = auth.outcomes();

        let result = assert_ok!(auth.attempt_login(Credential::new("admin", "correct")).await);

        let AuthResult::Match(record) = &result else {
            panic!("expected a match, got {result:?}");
        };
        assert_eq!(record["username"], "admin");
        assert_eq!(auth.error(), None);
        assert_eq!(result.redirect(), Some("/home"));
        assert_eq!(outcomes.recv().await.unwrap(), result);
    }

    #[tokio::test]
    async fn duplicate_accounts_still_match() {
        let store = Arc::new(MemoryDataService::new().with_rows(
            "admin",
            vec![
                json!({"id": 1, "username": "admin", "password": "correct"}),
                json!({"id": 2, "username": "admin", "password": "correct"}),
            ],
        ));
        let auth = authenticator(store);
        let result = assert_ok!(auth.attempt_login(Credential::new("admin", "correct")).await);
        assert!(matches!(result, AuthResult::Match(ref r) if r["id"] == 1));
    }

    #[tokio::test]
    async fn unreachable_service_reports_service_error() {
        let store = store();
        store.set_unreachable(true);
        let auth = authenticator(store);

        let result = assert_ok!(auth.attempt_login(Credential::new("admin", "correct")).await);

        assert!(matches!(
            result,
            AuthResult::ServiceError(ServiceError::Unavailable(_))
        ));
        assert!(!auth.is_loading());
        assert_eq!(auth.error().as_deref(), Some("Something went wrong."));
    }

    #[tokio::test]
    async fn empty_credential_rejected_without_query() {
        let store = store();
        let auth = authenticator(store.clone());

        let err = assert_err!(auth.attempt_login(Credential::new("", "correct")).await);

        assert!(matches!(err, AuthError::InvalidCredential(_)));
        assert_eq!(store.calls().query, 0);
        assert_eq!(auth.state(), LoginState::default());
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_refused() {
        let gated = Arc::new(GatedService::new(store()));
        let auth = authenticator(gated.clone());

        let mut first = tokio_test::task::spawn(auth.attempt_login(Credential::new("admin", "correct")));
        assert_pending!(first.poll());
        assert!(auth.is_loading());

        let err = assert_err!(auth.attempt_login(Credential::new("admin", "correct")).await);
        assert_eq!(err, AuthError::AttemptInFlight);
        assert_eq!(gated.entered(), 1);

        gated.open();
        let result = assert_ok!(assert_ready!(first.poll()));
        assert!(result.is_match());
        assert!(!auth.is_loading());
        assert_eq!(gated.inner.calls().query, 1);

        // Guard released: a new attempt goes through.
        assert_ok!(auth.attempt_login(Credential::new("admin", "wrong")).await);
        assert_eq!(gated.entered(), 2);
    }

    #[tokio::test]
    async fn dropped_attempt_releases_guard() {
        let gated = Arc::new(GatedService::new(store()));
        let auth = authenticator(gated.clone());

        let mut pending = tokio_test::task::spawn(auth.attempt_login(Credential::new("admin", "correct")));
        assert_pending!(pending.poll());
        drop(pending);

        assert!(!auth.is_loading());
        gated.open();
        assert_ok!(auth.attempt_login(Credential::new("admin", "correct")).await);
    }

    #[tokio::test]
    async fn argon2_scheme_keeps_classification() {
        let hash = hash_password("correct").unwrap();
        let store = Arc::new(
            MemoryDataService::new()
                .with_rows("admin", vec![json!({"username": "admin", "password_hash": hash})]),
        );
        let auth = Authenticator::new(store, Box::new(Argon2Verifier), "admin");

        let ok = assert_ok!(auth.attempt_login(Credential::new("admin", "correct")).await);
        assert!(ok.is_match());

        let denied = assert_ok!(auth.attempt_login(Credential::new("admin", "wrong")).await);
        assert_eq!(denied, AuthResult::NoMatch);
    }
}
