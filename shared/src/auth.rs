//! Bearer token verification.
//!
//! Tokens are HS256 JWTs issued elsewhere; this module only verifies them and
//! turns their claims into an [`Identity`]. Identity is never taken from the
//! request body.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use lambda_http::http::header::AUTHORIZATION;
use lambda_http::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::{Error, Result};

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// JWT claims understood by the gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    /// Role, defaults to `user` when absent
    #[serde(default)]
    pub role: Role,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Verified caller identity, scoped to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Fail with [`Error::Forbidden`] unless the identity holds `role`.
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            return Ok(());
        }
        Err(Error::Forbidden(format!(
            "user {} has role {}, {} required",
            self.user_id,
            self.role.as_str(),
            role.as_str()
        )))
    }
}

impl TryFrom<TokenClaims> for Identity {
    type Error = AuthError;

    fn try_from(claims: TokenClaims) -> std::result::Result<Self, AuthError> {
        if claims.sub.trim().is_empty() {
            return Err(AuthError::Malformed("empty sub claim".to_string()));
        }

        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| AuthError::Malformed("iat out of range".to_string()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Malformed("exp out of range".to_string()))?;

        Ok(Self {
            user_id: claims.sub,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }
}

/// Verifies bearer credentials against the gateway's signing secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Create a validator for HS256 tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Require the `iss` claim to match.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self.validation.required_spec_claims.insert("iss".to_string());
        self
    }

    /// Require the `aud` claim to match.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self.validation.required_spec_claims.insert("aud".to_string());
        self
    }

    /// Allowed clock skew when checking `exp`.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Verify a credential and extract its identity.
    ///
    /// Pure: no shared state is touched.
    pub fn verify(&self, credential: &str) -> std::result::Result<Identity, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::Missing);
        }

        let token_data =
            decode::<TokenClaims>(credential, &self.key, &self.validation).map_err(classify)?;

        Identity::try_from(token_data.claims)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::SignatureInvalid,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature => AuthError::Malformed(err.to_string()),
        _ => AuthError::Unknown(err.to_string()),
    }
}

/// Pull the bearer credential out of the `Authorization` header.
///
/// A missing header is [`AuthError::Missing`]; a header with another scheme
/// or no token is [`AuthError::Malformed`].
pub fn bearer_credential(headers: &HeaderMap) -> std::result::Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::Malformed("non-ascii authorization header".to_string()))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Malformed("authorization header has no scheme".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed(format!("unsupported scheme {scheme}")));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Malformed("empty bearer token".to_string()));
    }

    Ok(token)
}


#[cfg(test)]
mod tests {
    use super::test_support::{mint_token, mint_with, SECRET};
    use super::*;
    use lambda_http::http::HeaderValue;
    use serde_json::json;

    fn validator() -> TokenValidator {
        TokenValidator::new(SECRET)
    }

    #[test]
    fn test_verify_user_token() {
        let token = mint_token("user-123", "user");
        let identity = validator().verify(&token).unwrap();
        assert_eq!(identity.user_id, "user-123");
        assert_eq!(identity.role, Role::User);
        assert_ne!(identity.role, Role::Admin);
        assert!(identity.expires_at > identity.issued_at);
    }

    #[test]
    fn test_verify_admin_token() {
        let token = mint_token("ops-1", "admin");
        let identity = validator().verify(&token).unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert!(identity.require_role(Role::Admin).is_ok());
    }

    #[test]
    fn test_missing_role_defaults_to_user() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(SECRET, json!({ "sub": "u", "iat": now, "exp": now + 60 }));
        let identity = validator().verify(&token).unwrap();
        assert_eq!(identity.role, Role::User);
        assert!(matches!(
            identity.require_role(Role::Admin),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(
            SECRET,
            json!({ "sub": "u", "role": "user", "iat": now - 7200, "exp": now - 3600 }),
        );
        assert_eq!(validator().verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(
            b"some-other-secret",
            json!({ "sub": "u", "role": "admin", "iat": now, "exp": now + 60 }),
        );
        assert_eq!(validator().verify(&token), Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = validator().verify("not-a-jwt").unwrap_err();
        assert_eq!(err.reason(), "malformed");
    }

    #[test]
    fn test_unknown_role_is_malformed() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(
            SECRET,
            json!({ "sub": "u", "role": "superuser", "iat": now, "exp": now + 60 }),
        );
        assert_eq!(validator().verify(&token).unwrap_err().reason(), "malformed");
    }

    #[test]
    fn test_empty_subject_is_malformed() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(SECRET, json!({ "sub": " ", "iat": now, "exp": now + 60 }));
        assert_eq!(validator().verify(&token).unwrap_err().reason(), "malformed");
    }

    #[test]
    fn test_empty_credential_is_missing() {
        assert_eq!(validator().verify("   "), Err(AuthError::Missing));
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(
            SECRET,
            json!({ "sub": "u", "iss": "https://other.example", "iat": now, "exp": now + 60 }),
        );
        let validator = validator().with_issuer("https://issuer.example");
        assert_eq!(validator.verify(&token).unwrap_err().reason(), "malformed");

        let unscoped = mint_token("u", "user");
        assert!(validator.verify(&unscoped).is_err());
    }

    #[test]
    fn test_audience_mismatch_is_malformed() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_with(
            SECRET,
            json!({ "sub": "u", "aud": "reporting", "iat": now, "exp": now + 60 }),
        );
        let validator = validator().with_audience("fund-insights");
        assert_eq!(validator.verify(&token).unwrap_err().reason(), "malformed");
    }

    #[test]
    fn test_bearer_credential_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_credential(&headers), Err(AuthError::Missing));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_credential(&headers), Ok("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz "));
        assert_eq!(bearer_credential(&headers), Ok("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_credential(&headers).unwrap_err().reason(), "malformed");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert_eq!(bearer_credential(&headers).unwrap_err().reason(), "malformed");
    }
}
