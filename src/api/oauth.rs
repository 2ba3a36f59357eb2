//! Access tokens for the Google Sheets API.
//!
//! The OAuth consent itself happens outside of this program; we expect `token.json` to hold a
//! refresh token. The `TokenProvider` hands out the current access token and refreshes it, saving
//! the result back to `token.json`, when it is about to expire.

use crate::api::files::{File, SecretFile, TokenFile};
use crate::error::Res;
use anyhow::Context;
use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use std::path::Path;
use tracing::{debug, info};

/// Provides a valid access token, refreshing it through Google's token endpoint when needed.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Loads the client secret and token files. Fails if either is missing or if the token lacks
    /// the scopes we need.
    pub(crate) async fn load(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret_path = secret_path.as_ref();
        let token_path = token_path.as_ref();
        let secret = File::<SecretFile>::load(secret_path)
            .await
            .with_context(|| {
                format!(
                    "Unable to load the OAuth client secret at {}",
                    secret_path.display()
                )
            })?
            .data()
            .clone();
        let token = File::<TokenFile>::load(token_path)
            .await
            .with_context(|| {
                format!("Unable to load the OAuth token at {}", token_path.display())
            })?;
        token.data().validate_scopes()?;
        debug!("Token valid until: {}", token.data().expires_at());
        Ok(Self { secret, token })
    }

    /// The current access token, which may be expired.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// The current access token, refreshed first if it is expired or about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token())
    }

    /// Exchanges the refresh token for a new access token and saves it to `token.json`.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        info!("Refreshing the Google OAuth access token");
        let client = BasicClient::new(ClientId::new(self.secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret().to_string()))
            .set_token_uri(
                TokenUrl::new(self.secret.token_uri().to_string())
                    .context("Invalid token_uri in the OAuth client secret")?,
            );

        let http_client = reqwest::ClientBuilder::new()
            // The token endpoint must not redirect.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Unable to build the HTTP client for OAuth")?;

        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client)
            .await
            .context("Unable to refresh the OAuth access token")?;

        let expires_in = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(|| chrono::Duration::hours(1));
        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            Utc::now() + expires_in,
            response.refresh_token().map(|rt| rt.secret().to_string()),
        );
        self.token.save().await?;
        debug!("Saved refreshed token to {}", self.token.path().display());
        Ok(())
    }
}
