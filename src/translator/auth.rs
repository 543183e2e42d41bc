use anyhow::{bail, Context, Result};
use tracing::info;

/// Header carrying the subscription key on the token request
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Exchange a subscription key for a bearer token.
///
/// The response body is the token itself and is returned unmodified. Any
/// failure is final: the session cannot start without a token and the request
/// is not retried.
pub async fn issue_token(
    client: &reqwest::Client,
    token_url: &str,
    subscription_key: &str,
) -> Result<String> {
    info!("Requesting access token from {}", token_url);

    let response = client
        .post(token_url)
        .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
        .body("")
        .send()
        .await
        .context("Failed to send token request")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Token request rejected with {}: {}", status, body.trim());
    }

    let token = response
        .text()
        .await
        .context("Failed to read token response")?;

    if token.is_empty() {
        bail!("Token endpoint returned an empty token");
    }

    info!("Access token issued ({} bytes)", token.len());

    Ok(token)
}
