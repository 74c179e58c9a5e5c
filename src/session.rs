//! Login session: the backend-issued JWT and the claims decoded from it.
//!
//! The token is only decoded, never verified; the backend that issued it
//! verifies it on every request.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::access::Role;
use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    pub role: Role,
    pub company: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An authenticated caller. Passed explicitly to every backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    claims: Claims,
}

impl Session {
    pub fn from_jwt(token: &str) -> Result<Self> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ConsoleError::InvalidToken(
                "JWT must have 3 parts".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ConsoleError::InvalidToken(format!("base64 decode failed: {e}")))?;
        let raw: RawClaims = serde_json::from_slice(&bytes)
            .map_err(|e| ConsoleError::InvalidToken(format!("JSON parse failed: {e}")))?;

        let role = match raw.role.as_deref().map(str::trim) {
            None | Some("") => return Err(ConsoleError::IncompleteClaims("role")),
            Some(tag) => tag.parse::<Role>()?,
        };

        let expires_at = match raw.exp {
            Some(exp) => Some(Utc.timestamp_opt(exp, 0).single().ok_or_else(|| {
                ConsoleError::InvalidToken(format!("exp out of range: {exp}"))
            })?),
            None => None,
        };

        Ok(Self {
            token: token.to_string(),
            claims: Claims {
                subject: raw.sub,
                role,
                company: raw.company,
                expires_at,
            },
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Tokens without an `exp` claim never expire on the client side.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.claims.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// File-backed token storage, the console's counterpart to browser storage.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session. A missing file or a token that no longer
    /// decodes both read as "not logged in".
    pub fn load(&self) -> Result<Option<Session>> {
        let token = match std::fs::read_to_string(&self.path) {
            Ok(token) => token,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match Session::from_jwt(&token) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable stored session");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, session.token())?;
        tracing::debug!(path = %self.path.display(), role = %session.role(), "Session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn make_jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let signature = URL_SAFE_NO_PAD.encode(b"sig");
        format!("{header}.{payload}.{signature}")
    }

    pub(crate) fn session_for(role: Role) -> Session {
        Session::from_jwt(&make_jwt(json!({ "sub": "alice", "role": role.tag() }))).unwrap()
    }

    #[test]
    fn decodes_role_and_subject() {
        let jwt = make_jwt(json!({
            "sub": "alice",
            "role": "VENDOR",
            "company": "Acme Staffing",
            "exp": 4_102_444_800i64,
        }));
        let session = Session::from_jwt(&jwt).unwrap();
        assert_eq!(session.role(), Role::Vendor);
        assert_eq!(session.claims().subject.as_deref(), Some("alice"));
        assert_eq!(session.claims().company.as_deref(), Some("Acme Staffing"));
        assert_eq!(session.token(), jwt);
        assert_eq!(session.bearer(), format!("Bearer {jwt}"));
    }

    #[test]
    fn missing_role_is_incomplete() {
        let jwt = make_jwt(json!({ "sub": "alice" }));
        assert!(matches!(
            Session::from_jwt(&jwt),
            Err(ConsoleError::IncompleteClaims("role"))
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let jwt = make_jwt(json!({ "sub": "alice", "role": "INTERN" }));
        assert!(matches!(
            Session::from_jwt(&jwt),
            Err(ConsoleError::UnknownRole(ref r)) if r == "INTERN"
        ));
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        for token in ["", "abc", "a.b", "a.!!!.c", "a.b.c.d"] {
            assert!(
                matches!(Session::from_jwt(token), Err(ConsoleError::InvalidToken(_))),
                "{token:?} should be invalid"
            );
        }
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let jwt = make_jwt(json!({ "role": "PMO", "exp": 1_000 }));
        let session = Session::from_jwt(&jwt).unwrap();
        assert!(session.is_expired(Utc::now()));

        let fresh = session_for(Role::Pmo);
        assert!(!fresh.is_expired(Utc::now()));
    }

    #[test]
    fn store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session"));

        assert!(store.load().unwrap().is_none());

        let session = session_for(Role::Pmo);
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_stored_token_loads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        std::fs::write(&path, "not-a-jwt").unwrap();
        assert!(SessionStore::new(path).load().unwrap().is_none());
    }
}
