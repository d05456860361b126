//! Upstream backend client.
//!
//! Credential checks live in the upstream service at `BACKEND_URL`; this
//! server only relays the login request and hands back whatever it answers.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

const LOGIN_PATH: &str = "api/auth/login";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the upstream backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// `BACKEND_URL` is not set.
    #[error("backend URL is not configured")]
    NotConfigured,

    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with something other than JSON.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A relayed upstream answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: Value,
}

/// HTTP client for the upstream backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl BackendClient {
    /// Create a client. `base_url` of `None` yields a client whose every
    /// call fails with [`BackendError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: Option<Url>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("kaaya-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.map(|mut url| {
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            url
        });

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// The full upstream login URL.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotConfigured` without a base URL.
    pub fn login_url(&self) -> Result<Url, BackendError> {
        let base = self.base_url.as_ref().ok_or(BackendError::NotConfigured)?;
        Ok(base.join(LOGIN_PATH)?)
    }

    /// Relay a login request body to the upstream backend.
    ///
    /// Upstream 4xx answers are returned as-is so the client sees the real
    /// reason (e.g. wrong password); only transport failures are errors.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the backend is not configured, unreachable,
    /// or answers with a non-JSON body.
    pub async fn login(&self, body: &Value) -> Result<Relayed, BackendError> {
        let url = self.login_url()?;
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(status = %status, error = %e, "Upstream login returned non-JSON body");
            BackendError::InvalidResponse(format!("status {status}"))
        })?;

        Ok(Relayed {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_keeps_base_path() {
        let client = BackendClient::new(Some(Url::parse("https://api.kaayalife.in/v1").unwrap())).unwrap();
        assert_eq!(
            client.login_url().unwrap().as_str(),
            "https://api.kaayalife.in/v1/api/auth/login"
        );
    }

    #[test]
    fn test_unconfigured_client() {
        let client = BackendClient::new(None).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(client.login_url(), Err(BackendError::NotConfigured)));
    }
}
