//! Credential providers.
//!
//! # Responsibilities
//! - Define the contract lanes use to obtain bearer tokens
//! - Ship the stock providers: random (demo), static, HTTP token endpoint
//! - Keep token material out of logs
//!
//! # Design Decisions
//! - Providers are passed in explicitly; there is no process-wide token source
//! - Providers do not time themselves out; the client source bounds every fetch

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::credentials::CredentialError;

/// Boxed future returned by [`CredentialProvider::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AccessToken, CredentialError>> + Send + 'a>>;

/// Source of fresh bearer tokens for a lane.
pub trait CredentialProvider: Send + Sync + 'static {
    /// Obtain a token for `client_id`. May fail or never complete.
    fn fetch<'a>(&'a self, client_id: &'a str) -> FetchFuture<'a>;
}

/// Bearer token that redacts itself in `Debug` and `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token value, rejecting empty strings.
    pub fn new(value: impl Into<String>) -> Result<Self, CredentialError> {
        let value = value.into();
        if value.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        Ok(Self(value))
    }

    /// The raw token. Callers must avoid logging it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"<redacted>").finish()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Issues a fresh random token on every fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenProvider;

impl CredentialProvider for RandomTokenProvider {
    fn fetch<'a>(&'a self, _client_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async { AccessToken::new(Uuid::new_v4().to_string()) })
    }
}

/// Returns the same token on every fetch.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn fetch<'a>(&'a self, _client_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetches tokens from an HTTP endpoint.
///
/// Sends `POST {"client_id": "..."}` and expects `{"access_token": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    client: reqwest::Client,
    token_url: Url,
}

impl HttpTokenProvider {
    pub fn new(token_url: Url) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, token_url })
    }

    async fn request(&self, client_id: &str) -> Result<AccessToken, CredentialError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .json(&TokenRequest { client_id })
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body)?;

        AccessToken::new(token.access_token)
    }
}

impl CredentialProvider for HttpTokenProvider {
    fn fetch<'a>(&'a self, client_id: &'a str) -> FetchFuture<'a> {
        Box::pin(self.request(client_id))
    }
}

/// Build the provider selected in configuration.
pub fn build_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
    let provider: Arc<dyn CredentialProvider> = match config {
        ProviderConfig::Random => Arc::new(RandomTokenProvider),
        ProviderConfig::Static { token } => {
            Arc::new(StaticTokenProvider::new(AccessToken::new(token.clone())?))
        }
        ProviderConfig::Http { token_url } => {
            Arc::new(HttpTokenProvider::new(Url::parse(token_url)?)?)
        }
    };
    Ok(provider)
}
