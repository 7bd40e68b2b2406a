//! OAuth2 refresh-token exchange
//!
//! The daemon never runs an interactive consent flow. It is configured with
//! a long-lived refresh token and trades it for a fresh access token on
//! startup.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken,
    TokenResponse, TokenUrl,
};
use tracing::info;

/// Google's OAuth2 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Lifetime assumed when the token endpoint does not report one
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// How long before expiry a token should be replaced
const REFRESH_MARGIN_SECS: i64 = 300;

/// An issued bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    /// The refresh token to use next time; the one sent if none was rotated in
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left until the token should be refreshed; zero if already due
    pub fn refresh_due_in(&self) -> std::time::Duration {
        (self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// Exchanges refresh tokens at a token endpoint
pub struct TokenRefresher {
    client: BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
}

impl TokenRefresher {
    /// Creates a refresher for one OAuth client
    ///
    /// # Errors
    /// Fails if `token_url` is not a valid URL.
    pub fn new(client_id: &str, client_secret: &str, token_url: &str) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("Invalid token URL")?);

        Ok(Self { client })
    }

    /// Trades `refresh_token` for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        info!("Refreshing access token");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .context("Failed to refresh token")?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_LIFETIME_SECS));

        let token = AccessToken {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        };

        info!(expires_at = %token.expires_at, "Successfully refreshed access token");
        Ok(token)
    }
}
