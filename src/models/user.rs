//! Admin account view returned after a successful login.

use serde::Serialize;

use crate::models::record::Record;

/// Columns never echoed back to the client.
const SECRET_COLUMNS: &[&str] = &["password", "password_hash"];

/// Matched admin record with credential columns stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminProfile {
    pub username: String,
    #[serde(flatten)]
    pub attributes: Record,
}

impl From<Record> for AdminProfile {
    fn from(mut record: Record) -> Self {
        for column in SECRET_COLUMNS {
            record.remove(*column);
        }
        let username = record
            .remove("username")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            username,
            attributes: record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_excludes_password() {
        let record = json!({
            "id": 1,
            "username": "admin",
            "password": "correct",
            "password_hash": "$argon2id$..."
        });
        let profile = AdminProfile::from(record.as_object().cloned().unwrap());
        assert_eq!(profile.username, "admin");

        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("correct"));
        assert!(json.contains("\"id\":1"));
    }
}
