//! Mint bearer tokens for local testing and back-office scripts.
//!
//! The storefront never issues tokens itself. This command produces one
//! the storefront will accept: HS256-signed with `AUTH_TOKEN_SECRET` when
//! that variable is set, unsigned otherwise.

use chrono::{Duration, Utc};
use secrecy::SecretString;

use kaaya_core::{Email, UserRole};
use kaaya_storefront::services::auth::{Claims, TokenDecoder};

use super::CliError;

/// Build and sign a token for the given identity.
pub fn mint(
    user_id: i32,
    email: Option<String>,
    name: Option<String>,
    role: &str,
    ttl_hours: i64,
) -> Result<String, CliError> {
    let secret = std::env::var("AUTH_TOKEN_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from);
    if secret.is_none() {
        tracing::warn!("AUTH_TOKEN_SECRET not set, minting an unsigned token");
    }
    mint_with(&TokenDecoder::new(secret), user_id, email, name, role, ttl_hours)
}

fn mint_with(
    tokens: &TokenDecoder,
    user_id: i32,
    email: Option<String>,
    name: Option<String>,
    role: &str,
    ttl_hours: i64,
) -> Result<String, CliError> {
    if user_id <= 0 {
        return Err(CliError::InvalidArgument("user id must be positive".to_owned()));
    }
    if ttl_hours <= 0 {
        return Err(CliError::InvalidArgument("ttl must be at least one hour".to_owned()));
    }
    let role: UserRole = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let email = email
        .as_deref()
        .map(Email::parse)
        .transpose()
        .map_err(|e| CliError::InvalidEmail(e.to_string()))?;

    let now = Utc::now();
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CliError::InvalidArgument("ttl is too large".to_owned()))?;
    let claims = Claims {
        sub: user_id,
        email: email.map(|e| e.to_string()),
        name,
        role,
        exp: Some(expires_at.timestamp()),
        iat: Some(now.timestamp()),
    };

    tracing::info!(user_id, %role, ttl_hours, "Minting token");
    Ok(tokens.mint(&claims)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_token_decodes_with_same_secret() {
        let tokens = TokenDecoder::new(Some(SecretString::from("cli-secret")));
        let token = mint_with(
            &tokens,
            7,
            Some("Asha@Example.com".to_owned()),
            Some("Asha".to_owned()),
            "admin",
            2,
        )
        .unwrap();

        let user = tokens.decode(&token, Utc::now()).unwrap();
        assert_eq!(user.id.as_i32(), 7);
        assert!(user.is_admin());
        assert_eq!(user.name.as_deref(), Some("Asha"));
    }

    #[test]
    fn test_rejects_unknown_role_and_bad_ids() {
        let tokens = TokenDecoder::new(None);
        assert!(matches!(
            mint_with(&tokens, 1, None, None, "owner", 1),
            Err(CliError::InvalidRole(_))
        ));
        assert!(matches!(
            mint_with(&tokens, 0, None, None, "customer", 1),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            mint_with(&tokens, 1, Some("not-an-email".to_owned()), None, "customer", 1),
            Err(CliError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_rejects_ttl_beyond_representable_time() {
        let tokens = TokenDecoder::new(None);
        for ttl_hours in [i64::MAX, i64::MAX / 3_600, 3_000_000_000] {
            assert!(matches!(
                mint_with(&tokens, 1, None, None, "customer", ttl_hours),
                Err(CliError::InvalidArgument(_))
            ));
        }
        assert!(mint_with(&tokens, 1, None, None, "customer", 24 * 365).is_ok());
    }
}
