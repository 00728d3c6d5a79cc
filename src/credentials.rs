//! Service-account authorization for the Sheets API.
//!
//! The credential file is the JSON key Google issues for a service account.
//! It is exchanged for a short-lived bearer token by signing a JWT assertion
//! and posting it to the key's token endpoint.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

use crate::config::{TOKEN_LIFETIME, TOKEN_REFRESH_MARGIN};
use crate::error::{PanelError, Result};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a service-account key file that authorization needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

impl ServiceAccountKey {
    /// Read and validate a key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PanelError::Credentials(format!("{}: {}", path.display(), e)))?;
        let key: ServiceAccountKey = serde_json::from_str(&contents)
            .map_err(|e| PanelError::Credentials(format!("{}: {}", path.display(), e)))?;
        if key.key_type != "service_account" {
            return Err(PanelError::Credentials(format!(
                "{}: expected a service_account key, found {:?}",
                path.display(),
                key.key_type
            )));
        }
        Ok(key)
    }

    /// Signed RS256 assertion requesting `scope`, issued at `now` (unix seconds).
    pub fn assertion(&self, scope: &str, now: i64) -> Result<String> {
        let signing_key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| PanelError::Credentials(format!("invalid private key: {}", e)))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME,
        };

        encode(&header, &claims, &signing_key)
            .map_err(|e| PanelError::Credentials(format!("could not sign assertion: {}", e)))
    }
}

/// Authorized handle to the Google APIs.
///
/// Holds the HTTP client and a bearer token that is renewed when it gets
/// close to expiry.
pub struct AuthorizedClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    scope: String,
    token: Mutex<AccessToken>,
}

/// Load the credential file at `path` and obtain a token for `scope`.
pub async fn authorize(path: impl AsRef<Path>, scope: &str) -> Result<AuthorizedClient> {
    let key = ServiceAccountKey::from_file(path)?;
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| PanelError::Credentials(e.to_string()))?;
    let token = fetch_token(&http, &key, scope).await?;
    log::info!("authorized as {}", key.client_email);

    Ok(AuthorizedClient {
        http,
        key,
        scope: scope.to_string(),
        token: Mutex::new(token),
    })
}

async fn fetch_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
) -> Result<AccessToken> {
    let now = Utc::now().timestamp();
    let assertion = key.assertion(scope, now)?;

    log::debug!("requesting access token from {}", key.token_uri);
    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| PanelError::Credentials(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PanelError::Credentials(format!("{}: {}", status, body)));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| PanelError::Credentials(e.to_string()))?;

    Ok(AccessToken {
        value: token.access_token,
        expires_at: now + token.expires_in.unwrap_or(TOKEN_LIFETIME),
    })
}

impl AuthorizedClient {
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Current bearer token, renewed first if it is about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if Utc::now().timestamp() + TOKEN_REFRESH_MARGIN >= token.expires_at {
            log::debug!("access token expiring, renewing");
            *token = fetch_token(&self.http, &self.key, &self.scope).await?;
        }
        Ok(token.value.clone())
    }

    /// Send an authorized request.
    ///
    /// Transport failures and non-success statuses are turned into the error
    /// built by `kind`, so each caller decides which failure class applies.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
        kind: fn(String) -> PanelError,
    ) -> Result<reqwest::Response> {
        let bearer = self.bearer().await?;
        let response = request
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| kind(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(kind(api_message(status, &body)))
    }
}

/// Pull the human-readable message out of a Google API error body.
fn api_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
    match message {
        Some(message) => format!("{}: {}", status, message),
        None => status.to_string(),
    }
}
