use anyhow::{Context, Result};
use reqwest::Url;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use uuid::Uuid;

use crate::config::{ServiceConfig, TranslationConfig};

/// Per-session correlation header (`X-ClientTraceId`)
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-clienttraceid");

/// Where and how to open a translation session
#[derive(Debug, Clone)]
pub struct TranslationTarget {
    pub endpoint: String,
    pub api_version: String,
    pub from: String,
    pub to: String,
    pub features: Vec<String>,
    pub format: String,
    pub profanity_action: String,
    pub profanity_marker: String,
    pub trace_id: Uuid,
}

impl TranslationTarget {
    pub fn new(service: &ServiceConfig, translation: &TranslationConfig, trace_id: Uuid) -> Self {
        Self {
            endpoint: service.endpoint.clone(),
            api_version: service.api_version.clone(),
            from: translation.from.clone(),
            to: translation.to.clone(),
            features: translation.features.clone(),
            format: translation.format.clone(),
            profanity_action: translation.profanity_action.clone(),
            profanity_marker: translation.profanity_marker.clone(),
            trace_id,
        }
    }

    /// Connection URL with every session parameter in the query string
    pub fn url(&self) -> Result<Url> {
        let features = self.features.join(",");
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("from", self.from.as_str()),
                ("to", self.to.as_str()),
                ("features", features.as_str()),
                ("format", self.format.as_str()),
                ("ProfanityAction", self.profanity_action.as_str()),
                ("ProfanityMarker", self.profanity_marker.as_str()),
                ("api-version", self.api_version.as_str()),
            ],
        )
        .with_context(|| format!("Invalid translator endpoint: {}", self.endpoint))
    }

    /// WebSocket handshake request carrying the bearer token and trace ID
    pub fn request(&self, token: &str) -> Result<Request> {
        let url = self.url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .context("Failed to build handshake request")?;

        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Access token is not a valid header value")?,
        );
        headers.insert(
            TRACE_ID_HEADER,
            HeaderValue::from_str(&self.trace_id.to_string())
                .context("Trace ID is not a valid header value")?,
        );

        Ok(request)
    }

    /// File extension for synthesized segments, derived from the requested format
    pub fn output_extension(&self) -> String {
        output_extension(&self.format)
    }
}

/// `audio/mp3` → `mp3`, `audio/wav` → `wav`; falls back to `bin`
pub fn output_extension(format: &str) -> String {
    let subtype = format
        .split('/')
        .nth(1)
        .map(|s| s.split(';').next().unwrap_or(s).trim())
        .unwrap_or("");

    match subtype {
        "mpeg" | "mp3" => "mp3".to_string(),
        "wav" | "wave" | "x-wav" => "wav".to_string(),
        "" => "bin".to_string(),
        other => other.to_string(),
    }
}
