use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{EmployeeId, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: EmployeeId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_utc().is_some_and(|expires_at| expires_at <= now)
    }

    /// Fills `expires_at` from `expires_in` when the token endpoint only
    /// returns the relative lifetime.
    pub fn with_absolute_expiry(mut self, issued_at: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in {
                self.expires_at = Some(issued_at.timestamp() + expires_in);
            }
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordGrantRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshGrantRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    Recovery,
    Magiclink,
    Invite,
    Signup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub token_hash: String,
    #[serde(rename = "type")]
    pub kind: OtpKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreateUserRequest {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: NewUserMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserMetadata {
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignObjectRequest {
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignObjectResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    pub signed_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveObjectsRequest {
    pub prefixes: Vec<String>,
}

/// Notifications pushed by the auth provider to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(AuthUser),
    PasswordRecovery(Session),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
            AuthEvent::PasswordRecovery(_) => "PASSWORD_RECOVERY",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn session(extra: serde_json::Value) -> Session {
        let mut value = json!({
            "access_token": "a",
            "user": { "id": "6f1f2c1e-0c43-4a8e-9a7e-6b3c8f1d2a10" }
        });
        if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        serde_json::from_value(value).expect("session")
    }

    #[test]
    fn relative_lifetime_becomes_absolute_expiry() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("ts");
        let session = session(json!({ "expires_in": 3600 })).with_absolute_expiry(issued);
        assert_eq!(session.expires_at, Some(issued.timestamp() + 3600));
        assert!(!session.is_expired(issued));
        assert!(session.is_expired(issued + chrono::Duration::seconds(3600)));
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn session_without_expiry_never_expires() {
        let session = session(json!({}));
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn otp_request_uses_type_field() {
        let body = serde_json::to_value(VerifyOtpRequest {
            token_hash: "h".into(),
            kind: OtpKind::Recovery,
        })
        .expect("json");
        assert_eq!(body, json!({ "token_hash": "h", "type": "recovery" }));
    }
}
