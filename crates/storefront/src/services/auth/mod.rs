//! Bearer-token decoding.
//!
//! Tokens are JWT-shaped (`header.payload.signature`, base64url without
//! padding). The payload carries the caller's id, email, name, and role.
//! When `AUTH_TOKEN_SECRET` is configured the signature must be a valid
//! HS256 MAC over `header.payload`; without a secret the payload is trusted
//! as-is, which is only suitable for development and demo mode.

mod error;

pub use error::AuthError;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;

use kaaya_core::{Email, UserId, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried in a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id. Accepted as a JSON number or numeric string.
    #[serde(deserialize_with = "subject")]
    pub sub: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

fn subject<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    alg: Option<String>,
}

/// The caller identified by an accepted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<Email>,
    pub name: Option<String>,
    pub role: UserRole,
}

impl AuthUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Decodes (and, with a secret, verifies) bearer tokens.
#[derive(Clone)]
pub struct TokenDecoder {
    secret: Option<SecretString>,
}

impl std::fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("verifies_signature", &self.secret.is_some())
            .finish()
    }
}

impl TokenDecoder {
    #[must_use]
    pub const fn new(secret: Option<SecretString>) -> Self {
        Self { secret }
    }

    /// Whether signatures are checked.
    #[must_use]
    pub const fn verifies_signature(&self) -> bool {
        self.secret.is_some()
    }

    /// Decode a token into the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing why the token was rejected.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser, AuthError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        if let Some(secret) = &self.secret {
            let header: Header =
                serde_json::from_slice(&decode_segment(header)?).map_err(|_| AuthError::Malformed)?;
            match header.alg.as_deref() {
                Some("HS256") => {}
                other => {
                    return Err(AuthError::UnsupportedAlgorithm(
                        other.unwrap_or("none").to_string(),
                    ));
                }
            }

            let signature = decode_segment(signature)?;
            let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
                .map_err(|_| AuthError::InvalidSignature)?;
            mac.update(signing_input(token.trim()).as_bytes());
            // verify_slice compares in constant time.
            mac.verify_slice(&signature)
                .map_err(|_| AuthError::InvalidSignature)?;
        }

        let claims: Claims = serde_json::from_slice(&decode_segment(payload)?)
            .map_err(|e| AuthError::InvalidClaims(e.to_string()))?;

        if claims.exp.is_some_and(|exp| exp <= now.timestamp()) {
            return Err(AuthError::Expired);
        }
        if claims.sub <= 0 {
            return Err(AuthError::InvalidClaims("sub must be a positive id".to_string()));
        }

        let email = claims
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| AuthError::InvalidClaims(format!("email: {e}")))?;

        Ok(AuthUser {
            id: UserId::new(claims.sub),
            email,
            name: claims.name,
            role: claims.role,
        })
    }

    /// Issue a token for `claims`.
    ///
    /// Signed with HS256 when a secret is configured, otherwise emitted with
    /// `alg: none` and an empty signature segment.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClaims` if the claims cannot be serialized.
    pub fn mint(&self, claims: &Claims) -> Result<String, AuthError> {
        let alg = if self.secret.is_some() { "HS256" } else { "none" };
        let header = serde_json::json!({ "alg": alg, "typ": "JWT" });
        let payload =
            serde_json::to_vec(claims).map_err(|e| AuthError::InvalidClaims(e.to_string()))?;
        let unsigned = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let signature = match &self.secret {
            Some(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(unsigned.as_bytes());
                URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
            }
            None => String::new(),
        };

        Ok(format!("{unsigned}.{signature}"))
    }
}

/// `header.payload` portion of a token.
fn signing_input(token: &str) -> &str {
    token.rsplit_once('.').map_or(token, |(input, _)| input)
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| AuthError::Malformed)
}

/// Pull the token out of an `Authorization` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
