//! Authentication boundary.
//!
//! The pipeline only talks to the [`Authenticator`] trait. The bundled
//! [`StaticAuthenticator`] resolves principals from configured API keys and
//! from session tokens issued by the anonymous `login` action.

use axum::http::{header, StatusCode};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::pipeline::request::ApiRequest;
use crate::pipeline::response::ApiResponse;
use crate::security::digest::{digests_match, sha256_hex};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user: String,
    pub role: Option<String>,
}

/// Credential verification collaborator.
pub trait Authenticator: Send + Sync {
    /// Resolve the caller, or return the response that rejects the request.
    fn authenticate(&self, request: &ApiRequest) -> Result<Principal, ApiResponse>;

    /// Non-failing peek at the caller's user id, used for rate-limit keys
    /// before authentication runs.
    fn identify(&self, _request: &ApiRequest) -> Option<String> {
        None
    }

    /// Exchange credentials for a session.
    fn login(&self, request: &ApiRequest) -> Result<Value, ApiError>;

    /// The unauthorized response.
    fn unauthorized(&self) -> ApiResponse {
        let mut response = ApiResponse::error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Valid credentials are required",
        );
        response.set_header_name(header::WWW_AUTHENTICATE, "Bearer");
        response
    }
}

#[derive(Debug, Clone)]
struct Session {
    user: String,
    expires_at_ms: u64,
}

/// Authenticator backed by static configuration.
pub struct StaticAuthenticator {
    api_keys: HashMap<String, String>,
    users: HashMap<String, String>,
    passwords: HashMap<String, String>,
    sessions: DashMap<String, Session>,
    session_ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl StaticAuthenticator {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            api_keys: config.api_keys.clone().into_iter().collect(),
            users: config.users.clone().into_iter().collect(),
            passwords: config
                .passwords
                .iter()
                .map(|(user, digest)| (user.clone(), digest.to_ascii_lowercase()))
                .collect(),
            sessions: DashMap::new(),
            session_ttl_secs: config.session_ttl_secs,
            clock,
        }
    }

    fn principal(&self, user: &str) -> Principal {
        Principal {
            user: user.to_string(),
            role: self.users.get(user).cloned(),
        }
    }

    fn session_user(&self, token: &str) -> Option<String> {
        let now = self.clock.now_millis();
        self.sessions
            .get(token)
            .filter(|s| s.expires_at_ms > now)
            .map(|s| s.user.clone())
    }

    fn resolve_user(&self, request: &ApiRequest) -> Option<String> {
        if let Some(token) = request.bearer_token() {
            if let Some(user) = self.session_user(token) {
                return Some(user);
            }
            if let Some(user) = self.api_keys.get(token) {
                return Some(user.clone());
            }
        }
        request
            .api_key()
            .and_then(|key| self.api_keys.get(key))
            .cloned()
    }

    /// Drop expired sessions. Returns the number removed.
    pub fn purge_expired_sessions(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at_ms > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, request: &ApiRequest) -> Result<Principal, ApiResponse> {
        self.resolve_user(request)
            .map(|user| self.principal(&user))
            .ok_or_else(|| self.unauthorized())
    }

    fn identify(&self, request: &ApiRequest) -> Option<String> {
        self.resolve_user(request)
    }

    fn login(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let body = request.json_body()?.unwrap_or(Value::Null);
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| request.params.get(name).cloned())
        };
        let (Some(username), Some(password)) = (field("username"), field("password")) else {
            return Err(ApiError::BadRequest(
                "login requires username and password".to_string(),
            ));
        };

        let verified = self
            .passwords
            .get(&username)
            .map(|expected| digests_match(expected, &sha256_hex(&password)))
            .unwrap_or(false);
        if !verified {
            return Err(ApiError::Unauthenticated(Box::new(self.unauthorized())));
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user: username.clone(),
                expires_at_ms: self.clock.now_millis() + self.session_ttl_secs * 1000,
            },
        );
        tracing::info!(user = %username, "Session issued");

        let principal = self.principal(&username);
        Ok(json!({
            "token": token,
            "user": principal.user,
            "role": principal.role,
            "expires_in": self.session_ttl_secs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use axum::http::Method;
    use std::time::Duration;

    fn authenticator() -> (StaticAuthenticator, Arc<ManualClock>) {
        let mut config = AuthConfig::default();
        config.api_keys.insert("key-alice".into(), "alice".into());
        config.api_keys.insert("key-nobody".into(), "nobody".into());
        config.users.insert("alice".into(), "admin".into());
        config.passwords.insert("alice".into(), sha256_hex("hunter2"));
        config.session_ttl_secs = 60;
        let clock = Arc::new(ManualClock::default());
        (StaticAuthenticator::new(&config, clock.clone()), clock)
    }

    #[test]
    fn test_api_key_authentication() {
        let (auth, _) = authenticator();
        let req = ApiRequest::new(Method::GET).with_header("X-API-Key", "key-alice");
        let principal = auth.authenticate(&req).unwrap();
        assert_eq!(principal.user, "alice");
        assert_eq!(principal.role.as_deref(), Some("admin"));

        let req = ApiRequest::new(Method::GET).with_header("X-API-Key", "key-nobody");
        assert_eq!(auth.authenticate(&req).unwrap().role, None);
    }

    #[test]
    fn test_missing_or_wrong_credentials() {
        let (auth, _) = authenticator();
        let rejected = auth.authenticate(&ApiRequest::new(Method::GET)).unwrap_err();
        assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejected.header_str("www-authenticate"), Some("Bearer"));

        let req = ApiRequest::new(Method::GET).with_header("X-API-Key", "wrong");
        assert!(auth.authenticate(&req).is_err());
        assert_eq!(auth.identify(&req), None);
    }

    #[test]
    fn test_login_issues_expiring_session() {
        let (auth, clock) = authenticator();
        let login = ApiRequest::new(Method::POST)
            .with_json(&json!({"username": "alice", "password": "hunter2"}));
        let session = auth.login(&login).unwrap();
        let token = session["token"].as_str().unwrap().to_string();
        assert_eq!(session["role"], "admin");

        let req = ApiRequest::new(Method::GET).with_header("Authorization", &format!("Bearer {token}"));
        assert_eq!(auth.authenticate(&req).unwrap().user, "alice");
        assert_eq!(auth.identify(&req).as_deref(), Some("alice"));

        clock.advance(Duration::from_secs(61));
        assert!(auth.authenticate(&req).is_err());
        assert_eq!(auth.purge_expired_sessions(), 1);
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn test_login_rejects_bad_password() {
        let (auth, _) = authenticator();
        let login = ApiRequest::new(Method::POST)
            .with_param("username", "alice")
            .with_param("password", "wrong");
        assert!(matches!(auth.login(&login), Err(ApiError::Unauthenticated(_))));

        let incomplete = ApiRequest::new(Method::POST).with_param("username", "alice");
        assert!(matches!(auth.login(&incomplete), Err(ApiError::BadRequest(_))));
    }
}
