use anyhow::{anyhow, Context, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use super::auth::issue_token;
use super::target::TranslationTarget;
use crate::config::ServiceConfig;

/// Response header holding the server-generated request ID
const REQUEST_ID_HEADER: &str = "x-requestid";

pub type TranslatorStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TranslatorClient {
    http: reqwest::Client,
    service: ServiceConfig,
}

impl TranslatorClient {
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            service,
        }
    }

    /// Obtain a bearer token for the configured subscription
    pub async fn authenticate(&self) -> Result<String> {
        let key = self
            .service
            .subscription_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow!("No subscription key configured (set LOQA__SERVICE__SUBSCRIPTION_KEY)")
            })?;

        issue_token(&self.http, &self.service.token_url, key).await
    }

    /// Open the duplex speech socket
    pub async fn connect(&self, target: &TranslationTarget, token: &str) -> Result<TranslatorStream> {
        let request = target.request(token)?;

        info!("Connecting to translator at {}", request.uri());

        let (stream, response) = connect_async(request)
            .await
            .context("Failed to open translator connection")?;

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<none>");

        info!(
            "Connected. Server generated request ID = {} (trace ID {})",
            request_id, target.trace_id
        );

        Ok(stream)
    }
}
