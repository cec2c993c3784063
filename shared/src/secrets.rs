//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;

use crate::config::SigningSecretSource;
use crate::{Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// JSON form of the signing secret.
#[derive(Debug, Deserialize)]
struct SigningSecret {
    jwt_secret: String,
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    // Check cache first
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .to_string();

    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}

/// Accepts either `{"jwt_secret": "..."}` or the raw secret string.
pub fn parse_signing_secret(secret_string: &str) -> Result<String> {
    let secret = match serde_json::from_str::<SigningSecret>(secret_string) {
        Ok(parsed) => parsed.jwt_secret,
        Err(_) => secret_string.trim().to_string(),
    };

    if secret.is_empty() {
        return Err(Error::Config("JWT signing secret is empty".to_string()));
    }
    Ok(secret)
}

/// Resolve the JWT signing secret from its configured source.
pub async fn resolve_signing_secret(
    client: &SecretsClient,
    source: &SigningSecretSource,
) -> Result<String> {
    match source {
        SigningSecretSource::Inline(secret) => parse_signing_secret(secret),
        SigningSecretSource::SecretsManager(arn) => {
            let secret_string = get_secret(client, arn).await?;
            parse_signing_secret(&secret_string)
        }
    }
}
