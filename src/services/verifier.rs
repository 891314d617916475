//! Credential verification schemes for the login gate.
//!
//! A verifier decides which lookup filters the login query uses and whether
//! a returned record actually proves the credential.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::config::CredentialScheme;
use crate::errors::AppError;
use crate::models::credential::Credential;
use crate::models::record::{Filter, Record};

pub trait CredentialVerifier: Send + Sync {
    /// Filters for the single lookup query.
    fn lookup_filters(&self, credential: &Credential) -> Vec<Filter>;

    /// Whether a returned record proves the credential.
    fn accepts(&self, credential: &Credential, record: &Record) -> bool;
}

/// Legacy scheme: exact match on stored plaintext passwords.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextVerifier;

impl CredentialVerifier for PlaintextVerifier {
    fn lookup_filters(&self, credential: &Credential) -> Vec<Filter> {
        vec![
            Filter::eq("username", &credential.username),
            Filter::eq("password", &credential.password),
        ]
    }

    fn accepts(&self, _credential: &Credential, _record: &Record) -> bool {
        true
    }
}

/// Looks accounts up by username and verifies the argon2 `password_hash` column.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn lookup_filters(&self, credential: &Credential) -> Vec<Filter> {
        vec![Filter::eq("username", &credential.username)]
    }

    fn accepts(&self, credential: &Credential, record: &Record) -> bool {
        let Some(hash) = record.get("password_hash").and_then(|v| v.as_str()) else {
            return false;
        };
        match verify_password(&credential.password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }
}

/// Verifier for the configured scheme.
pub fn for_scheme(scheme: CredentialScheme) -> Box<dyn CredentialVerifier> {
    match scheme {
        CredentialScheme::Plaintext => Box::new(PlaintextVerifier),
        CredentialScheme::Argon2 => Box::new(Argon2Verifier),
    }
}

/// Hash a plaintext password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn password_hash_and_verify() {
        let password = "SecurePassword123!";
        let hash = hash_password(password).unwrap();
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn plaintext_filters_on_both_columns() {
        let filters = PlaintextVerifier.lookup_filters(&Credential::new("admin", "correct"));
        assert_eq!(
            filters,
            vec![Filter::eq("username", "admin"), Filter::eq("password", "correct")]
        );
    }

    #[test]
    fn argon2_checks_stored_hash() {
        let hash = hash_password("correct").unwrap();
        let record = json!({"username": "admin", "password_hash": hash});
        let record = record.as_object().unwrap();

        assert_eq!(
            Argon2Verifier.lookup_filters(&Credential::new("admin", "x")),
            vec![Filter::eq("username", "admin")]
        );
        assert!(Argon2Verifier.accepts(&Credential::new("admin", "correct"), record));
        assert!(!Argon2Verifier.accepts(&Credential::new("admin", "wrong"), record));
    }

    #[test]
    fn argon2_rejects_records_without_hash() {
        let record = json!({"username": "admin", "password_hash": "not-a-hash"});
        assert!(!Argon2Verifier.accepts(&Credential::new("admin", "x"), record.as_object().unwrap()));

        let record = json!({"username": "admin"});
        assert!(!Argon2Verifier.accepts(&Credential::new("admin", "x"), record.as_object().unwrap()));
    }
}
