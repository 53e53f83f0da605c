//! Temporary cloud credentials as seen by the client and the session.

use serde::{Deserialize, Serialize};

/// Temporary cloud credentials.
///
/// Every field is optional: the broker may only have part of a credential
/// set, and a session persists an empty object when the last known
/// credentials were incomplete. Absent fields are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Epoch milliseconds of the moment the credentials were captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl CloudCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
            session_token: Some(session_token.into()),
            updated_at: None,
        }
    }

    /// True when the access key, secret and session token are all present.
    /// `updated_at` plays no part.
    pub fn is_valid(&self) -> bool {
        self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.session_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy of the three credential fields stamped with `updated_at`
    pub fn stamped(&self, updated_at: i64) -> Self {
        Self {
            updated_at: Some(updated_at),
            ..self.clone()
        }
    }
}
