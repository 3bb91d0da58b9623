use serde::Deserialize;
use std::time::Duration;

use crate::config::Credentials;

use super::error::{BotError, Result};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Response from the token refresh endpoint. Twitch may omit the rotated
/// refresh token, in which case the current one stays valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[allow(dead_code)] // Part of the token endpoint response
    pub expires_in: Option<u64>,
}

/// Refresh the access token with the refresh-token grant and store the new
/// tokens back into the shared credential locks.
pub async fn refresh_access_token(credentials: &Credentials) -> Result<()> {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let current_refresh_token = credentials.refresh_token.read().await.clone();
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("grant_type", "refresh_token"),
        ("refresh_token", current_refresh_token.as_str()),
    ];

    let response = client.post(TOKEN_URL).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(BotError::Auth(format!(
            "token refresh failed: HTTP {} - {}",
            status, body
        )));
    }

    let token_response = response.json::<TokenResponse>().await?;

    {
        let mut access_token = credentials.access_token.write().await;
        *access_token = token_response.access_token;
    }
    if let Some(new_refresh) = token_response.refresh_token {
        let mut refresh_token = credentials.refresh_token.write().await;
        *refresh_token = new_refresh;
    }

    log::info!("Access token refreshed");
    Ok(())
}
