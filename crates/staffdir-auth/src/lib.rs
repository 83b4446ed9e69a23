use std::fmt::{Debug, Formatter};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use staffdir_core::{DirectoryError, Role};
use time::{Duration, OffsetDateTime};

/// Fixed validity window for issued session tokens.
pub const TOKEN_TTL: Duration = Duration::days(7);

/// A static login credential. Not mutable through any exposed operation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Credential {
    pub id: String,
    pub email: String,
    pub secret: String,
    pub role: Role,
}

/// The well-known proof-of-concept accounts.
#[must_use]
pub fn demo_credentials() -> Vec<Credential> {
    vec![
        Credential {
            id: "u_admin_1".to_string(),
            email: "admin@demo.com".to_string(),
            secret: "admin123".to_string(),
            role: Role::Admin,
        },
        Credential {
            id: "u_emp_1".to_string(),
            email: "employee@demo.com".to_string(),
            secret: "employee123".to_string(),
            role: Role::Employee,
        },
    ]
}

/// HS256 signing material, held in both encode and decode form.
#[derive(Clone)]
pub struct TokenKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKey {
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl Debug for TokenKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKey(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// The (user id, role) pair recovered from a verified token.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

/// A successful login or session echo.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub role: Role,
    pub user_id: String,
}

/// Sign a session token valid for [`TOKEN_TTL`] from `issued_at`.
///
/// # Errors
/// Returns [`DirectoryError::Internal`] when the signing library fails,
/// which cannot happen for HS256 secrets in practice.
pub fn issue_token(
    key: &TokenKey,
    user_id: &str,
    role: Role,
    issued_at: OffsetDateTime,
) -> Result<String, DirectoryError> {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: issued_at.unix_timestamp(),
        exp: (issued_at + TOKEN_TTL).unix_timestamp(),
    };
    encode(&Header::default(), &claims, &key.encoding)
        .map_err(|err| DirectoryError::Internal(format!("token signing failed: {err}")))
}

/// Recover the identity encoded in a token.
///
/// Any verification failure (bad signature, malformed token, expiry) yields
/// `None`: callers treat the request as anonymous rather than failing.
#[must_use]
pub fn verify_token(key: &TokenKey, token: &str) -> Option<Identity> {
    let validation = Validation::default();
    decode::<Claims>(token, &key.decoding, &validation)
        .ok()
        .map(|data| Identity { user_id: data.claims.sub, role: data.claims.role })
}

/// Extract the token from an `Authorization` header value.
///
/// Only the exact `Bearer <token>` shape is accepted; anything else is
/// treated as an absent credential, never as an error.
#[must_use]
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?;
    if token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}

/// Resolve a raw header value into a verified identity, degrading to
/// anonymous on any failure.
#[must_use]
pub fn identity_from_header(key: &TokenKey, header: Option<&str>) -> Option<Identity> {
    bearer_token(header).and_then(|token| verify_token(key, token))
}

/// Verify an email/secret pair and mint a session.
///
/// The failure is deliberately identical for an unknown email and a wrong
/// secret, so callers cannot probe which accounts exist.
///
/// # Errors
/// Returns [`DirectoryError::Authentication`] on any mismatch.
pub fn login(
    credentials: &[Credential],
    key: &TokenKey,
    email: &str,
    secret: &str,
    now: OffsetDateTime,
) -> Result<AuthSession, DirectoryError> {
    let email = email.trim().to_lowercase();
    let secret = secret.trim();

    let credential = credentials
        .iter()
        .find(|candidate| candidate.email.to_lowercase() == email && candidate.secret == secret)
        .ok_or(DirectoryError::Authentication)?;

    let token = issue_token(key, &credential.id, credential.role, now)?;
    Ok(AuthSession { token, role: credential.role, user_id: credential.id.clone() })
}

/// Every read operation requires some authenticated identity.
///
/// # Errors
/// Returns [`DirectoryError::Unauthenticated`] when no identity is present.
pub fn require_authenticated(identity: Option<&Identity>) -> Result<&Identity, DirectoryError> {
    identity.ok_or(DirectoryError::Unauthenticated)
}

/// Every mutation requires the administrator role specifically.
///
/// # Errors
/// Returns [`DirectoryError::Unauthenticated`] when no identity is present,
/// or [`DirectoryError::Unauthorized`] when the identity lacks the role.
pub fn require_admin(identity: Option<&Identity>) -> Result<&Identity, DirectoryError> {
    let identity = require_authenticated(identity)?;
    if identity.role == Role::Admin {
        Ok(identity)
    } else {
        Err(DirectoryError::Unauthorized)
    }
}
