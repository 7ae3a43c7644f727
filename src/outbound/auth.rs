use crate::domain::models::Credential;
use crate::domain::ports::TokenExchange;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Deserialize;
use serde_json::json;
use std::env::var;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

// Remaining validity below which a cached token counts as stale.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

// gcloud does not report the token lifetime; assume a bit less than the hour
// the backend grants.
const CLI_TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

/// Caches the bearer token for the embedding backend and refreshes it
/// through the configured exchange before it runs out.
pub struct CredentialManager {
    exchange: Arc<dyn TokenExchange>,
    current: Mutex<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        CredentialManager {
            exchange,
            current: Mutex::new(None),
        }
    }

    /// Returns a token with at least the safety margin of validity left.
    /// While more than the margin remains the cached token is handed out
    /// unchanged; otherwise a fresh exchange replaces it. Exchange failures
    /// propagate.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(credential) = current.as_ref() {
            if credential
                .expires_at
                .saturating_duration_since(Instant::now())
                > EXPIRY_MARGIN
            {
                return Ok(credential.token.clone());
            }
            debug!("Cached token is about to expire, refreshing");
        }

        let credential = self
            .exchange
            .exchange()
            .await
            .context("authentication failed")?;
        let token = credential.token.clone();
        *current = Some(credential);
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Signs a service account assertion and trades it for an access token at
/// the key's token endpoint.
pub struct ServiceAccountExchange {
    key: ServiceAccountKey,
    http: reqwest::Client,
}

impl ServiceAccountExchange {
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read service account key {}", path.display()))?;
        let key = serde_json::from_str(&raw)
            .with_context(|| format!("unable to parse service account key {}", path.display()))?;

        Ok(ServiceAccountExchange {
            key,
            http: reqwest::Client::new(),
        })
    }

    fn build_assertion(&self) -> Result<String> {
        let issued_at = Utc::now().timestamp();

        let header = json!({"alg": "RS256", "typ": "JWT"});
        let claims = json!({
            "iss": self.key.client_email,
            "scope": OAUTH_SCOPE,
            "aud": self.key.token_uri,
            "iat": issued_at,
            "exp": issued_at + ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let private_key = RsaPrivateKey::from_pkcs8_pem(&self.key.private_key)
            .map_err(|e| anyhow!("unable to parse the service account private key: {}", e))?;
        let signature = SigningKey::<Sha256>::new(private_key).sign(signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

#[async_trait]
impl TokenExchange for ServiceAccountExchange {
    async fn exchange(&self) -> Result<Credential> {
        let assertion = self.build_assertion()?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", &assertion)])
            .send()
            .await?
            .error_for_status()?;

        let token: TokenResponse = response.json().await?;
        debug!(
            "Exchanged service account assertion, token valid for {}s",
            token.expires_in
        );

        Ok(Credential {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

/// Delegates the exchange to the locally authenticated gcloud CLI.
#[derive(Debug, Default)]
pub struct GcloudCliExchange;

#[async_trait]
impl TokenExchange for GcloudCliExchange {
    async fn exchange(&self) -> Result<Credential> {
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .context("unable to run gcloud")?;

        if !output.status.success() {
            return Err(anyhow!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let token = String::from_utf8(output.stdout)?.trim().to_string();
        if token.is_empty() {
            return Err(anyhow!("gcloud returned an empty access token"));
        }

        Ok(Credential {
            token,
            expires_at: Instant::now() + CLI_TOKEN_LIFETIME,
        })
    }
}

/// Picks the service account strategy when key material is configured,
/// otherwise falls back to the gcloud CLI.
pub fn token_exchange_from_env() -> Result<Arc<dyn TokenExchange>> {
    dotenv::dotenv().ok();

    match var("GOOGLE_APPLICATION_CREDENTIALS") {
        Ok(path) => {
            info!("Using service account credentials from {}", path);
            Ok(Arc::new(ServiceAccountExchange::from_key_file(Path::new(
                &path,
            ))?))
        }
        Err(_) => {
            info!("GOOGLE_APPLICATION_CREDENTIALS not set, delegating to the gcloud CLI");
            Ok(Arc::new(GcloudCliExchange))
        }
    }
}
