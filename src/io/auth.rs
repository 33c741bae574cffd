use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::io::atomic::atomic_write;
use crate::io::remote_store::error_message;
use crate::model::config::RemoteConfig;
use crate::model::session::{Session, User};
use crate::ops::task_ops::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth server returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected auth response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("could not read session file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write session file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Body of a successful `/auth/v1/verify`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

/// Magic-link sign in against the hosted auth service
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()?;
        Ok(AuthClient {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Ask the service to e-mail a sign-in link and one-time code.
    pub fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        let email = validate_email(email)?;
        tracing::info!(%email, "requesting magic link");
        let resp = self
            .client
            .post(self.endpoint("otp"))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "create_user": true }))
            .send()?;
        check(resp).map(|_| ())
    }

    /// Exchange the e-mailed code for a session.
    pub fn verify(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let email = validate_email(email)?;
        let resp = self
            .client
            .post(self.endpoint("verify"))
            .header("apikey", &self.api_key)
            .json(&json!({ "type": "email", "email": email, "token": code.trim() }))
            .send()?;
        let text = check(resp)?.text()?;
        let token: TokenResponse = serde_json::from_str(&text).map_err(AuthError::Decode)?;
        tracing::info!(user = %token.user.id, "signed in");
        Ok(session_from_token(token, now))
    }

    /// Revoke the session's token. Offline sessions have nothing to revoke.
    pub fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let Some(token) = &session.access_token else {
            return Ok(());
        };
        let resp = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()?;
        check(resp).map(|_| ())
    }
}

fn session_from_token(token: TokenResponse, now: DateTime<Utc>) -> Session {
    Session {
        user: token.user,
        access_token: Some(token.access_token),
        refresh_token: token.refresh_token,
        expires_at: token.expires_in.map(|secs| now + Duration::seconds(secs)),
    }
}

fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let message = error_message(&body);
    tracing::warn!(status = status.as_u16(), %message, "auth call failed");
    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Trimmed, lowercased address with a non-empty local part and a dotted domain
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidEmail(email));
    }
    Ok(email)
}

// ---------------------------------------------------------------------------
// Session file
// ---------------------------------------------------------------------------

pub fn session_path(home: &Path) -> PathBuf {
    home.join("session.json")
}

/// The saved session, if any
pub fn load_session(home: &Path) -> Result<Option<Session>, AuthError> {
    let path = session_path(home);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AuthError::Read { path, source: e }),
    };
    match serde_json::from_str(&text) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
            Ok(None)
        }
    }
}

pub fn save_session(home: &Path, session: &Session) -> Result<(), AuthError> {
    let path = session_path(home);
    fs::create_dir_all(home).map_err(|e| AuthError::Write {
        path: path.clone(),
        source: e,
    })?;
    let json = serde_json::to_string_pretty(session).map_err(AuthError::Decode)?;
    atomic_write(&path, json.as_bytes()).map_err(|e| AuthError::Write {
        path: path.clone(),
        source: e,
    })?;
    restrict_permissions(&path);
    Ok(())
}

pub fn clear_session(home: &Path) -> Result<(), AuthError> {
    let path = session_path(home);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AuthError::Write { path, source: e }),
    }
}

/// The session file holds a bearer token
#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "could not restrict session file");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada@ex.com.").is_err());
        assert!(validate_email("a da@example.com").is_err());
    }

    #[test]
    fn test_session_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        assert!(load_session(tmp.path()).unwrap().is_none());

        let session = Session::offline("ada@example.com");
        save_session(tmp.path(), &session).unwrap();
        assert_eq!(load_session(tmp.path()).unwrap(), Some(session));

        clear_session(tmp.path()).unwrap();
        assert!(load_session(tmp.path()).unwrap().is_none());
        // clearing twice is fine
        clear_session(tmp.path()).unwrap();
    }

    #[test]
    fn test_unreadable_session_is_signed_out() {
        let tmp = TempDir::new().unwrap();
        fs::write(session_path(tmp.path()), "garbage").unwrap();
        assert!(load_session(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_session_from_token() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let token: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "jwt",
                "refresh_token": "r1",
                "expires_in": 3600,
                "token_type": "bearer",
                "user": {"id": "8b1c", "email": "ada@example.com", "aud": "authenticated"}
            }"#,
        )
        .unwrap();
        let session = session_from_token(token, now);
        assert_eq!(session.user_id(), "8b1c");
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
        assert_eq!(session.expires_at, Some(now + Duration::hours(1)));
        assert!(!session.is_expired(now));
    }
}
