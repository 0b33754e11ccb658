//! Identity provider client (OAuth2 authorization-code flow).
//!
//! Provider endpoints come from its OpenID Connect discovery document,
//! fetched lazily from the configured metadata URL and cached for the
//! process lifetime.  Code exchange and userinfo lookup are plain HTTPS
//! calls through `reqwest`; no token validation happens locally.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::AuthSettings;
use crate::errors::AuthError;

/// Scopes requested at login.
const SCOPES: &str = "openid email phone profile";

/// Characters escaped in query-string values (RFC 3986 unreserved stay).
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE).to_string()
}

/// Generate a per-login CSRF state value: 128 bits of randomness, hex.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// The subset of the provider's discovery document this service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer URL.
    pub issuer: String,
    /// Authorization endpoint the browser is redirected to.
    pub authorization_endpoint: String,
    /// Token endpoint for the server-side code exchange.
    pub token_endpoint: String,
    /// Userinfo endpoint queried with the access token.
    pub userinfo_endpoint: String,
    /// JWKS URI (present in every hosted-pool document).
    pub jwks_uri: String,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    /// Bearer token for the userinfo call.
    pub access_token: String,
    /// Identity token (unused here; claims come from userinfo).
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Claims returned by the userinfo endpoint.
///
/// `sub` is the stable subject identifier recorded on uploaded books;
/// everything else rides along in `additional`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// Client for the hosted identity provider.
pub struct OidcClient {
    http: reqwest::Client,
    settings: AuthSettings,
    /// This service's externally visible base URL, no trailing slash.
    base_url: String,
    /// Discovery document, fetched once on first use.
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    pub fn new(settings: AuthSettings, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            base_url,
            metadata: OnceCell::new(),
        }
    }

    /// The callback URL registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    /// Provider-side logout URL per the hosted-UI logout contract.
    pub fn logout_url(&self) -> String {
        format!(
            "{}/logout?client_id={}&logout_uri={}",
            self.settings.domain,
            encode(&self.settings.client_id),
            encode(&format!("{}/", self.base_url)),
        )
    }

    /// Authorization endpoint URL the login handler redirects to.
    pub async fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        let metadata = self.metadata().await?;
        Ok(build_authorize_url(
            &metadata.authorization_endpoint,
            &self.settings.client_id,
            &self.redirect_uri(),
            state,
        ))
    }

    /// Exchange an authorization code for tokens, then resolve the user
    /// claims from the userinfo endpoint.
    pub async fn authenticate(&self, code: &str) -> Result<UserClaims, AuthError> {
        let tokens = self.exchange_code(code).await?;
        self.fetch_userinfo(&tokens.access_token).await
    }

    /// Server-to-server exchange of the authorization code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let metadata = self.metadata().await?;
        let redirect_uri = self.redirect_uri();

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", self.settings.client_id.as_str());
        params.insert("client_secret", self.settings.client_secret.as_str());
        params.insert("redirect_uri", redirect_uri.as_str());

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AuthError::Exchange {
                message: format!("token endpoint returned {status}: {error_body}"),
            });
        }

        response.json().await.map_err(|e| AuthError::Exchange {
            message: e.to_string(),
        })
    }

    /// Fetch the user claims with the access token as a Bearer credential.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserClaims, AuthError> {
        let metadata = self.metadata().await?;

        let response = self
            .http
            .get(&metadata.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::UserInfo {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::UserInfo {
                message: format!("userinfo endpoint returned {}", response.status()),
            });
        }

        response.json().await.map_err(|e| AuthError::UserInfo {
            message: e.to_string(),
        })
    }

    /// The discovery document, fetching it on first use.
    async fn metadata(&self) -> Result<&ProviderMetadata, AuthError> {
        self.metadata
            .get_or_try_init(|| self.fetch_metadata())
            .await
    }

    async fn fetch_metadata(&self) -> Result<ProviderMetadata, AuthError> {
        let response = self
            .http
            .get(&self.settings.metadata_url)
            .send()
            .await
            .map_err(|e| AuthError::Discovery {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::Discovery {
                message: format!("discovery request failed: {}", response.status()),
            });
        }

        response.json().await.map_err(|e| AuthError::Discovery {
            message: e.to_string(),
        })
    }
}

/// Build the provider authorization URL for a login redirect.
fn build_authorize_url(endpoint: &str, client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{endpoint}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        encode(client_id),
        encode(redirect_uri),
        encode(SCOPES),
        encode(state),
    )
}
