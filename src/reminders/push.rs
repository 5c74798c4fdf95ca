use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::render::RenderedMessage;
use crate::config::PushConfig;

/// Data carried with the notification and read back when it is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushData {
    /// Text to speak aloud.
    pub message: String,
    /// Client URL to focus or open.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: PushData,
}

impl PushPayload {
    pub fn new(message: &RenderedMessage, speak_text: &str, origin_url: &str) -> Self {
        Self {
            title: message.title.clone(),
            body: message.body.clone(),
            data: PushData {
                message: speak_text.to_string(),
                url: origin_url.to_string(),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The gateway says this token will never accept deliveries again.
    #[error("Push token is no longer registered: {0}")]
    InvalidToken(String),

    #[error("Push transport error: {0}")]
    Transport(String),

    #[error("Push gateway rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl PushError {
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken(_))
    }
}

/// Delivery to one device token.
#[async_trait]
pub trait PushChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), PushError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFailure {
    pub token: String,
    pub error: PushError,
}

/// Outcome of fanning one payload out to every token of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<TokenFailure>,
}

impl DeliveryReport {
    /// At least one device accepted the message.
    pub fn is_success(&self) -> bool {
        self.delivered > 0
    }

    pub fn had_no_tokens(&self) -> bool {
        self.attempted == 0
    }

    pub fn invalid_tokens(&self) -> Vec<String> {
        self.failures
            .iter()
            .filter(|f| f.error.is_invalid_token())
            .map(|f| f.token.clone())
            .collect()
    }
}

/// Send `payload` to every token concurrently. One token failing never
/// prevents delivery to the others.
pub async fn deliver_to_all(
    channel: &dyn PushChannel,
    tokens: &[String],
    payload: &PushPayload,
) -> DeliveryReport {
    let results = join_all(tokens.iter().map(|token| async move {
        (token, channel.send(token, payload).await)
    }))
    .await;

    let mut report = DeliveryReport {
        attempted: tokens.len(),
        ..DeliveryReport::default()
    };
    for (token, result) in results {
        match result {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                tracing::debug!(
                    channel = channel.name(),
                    error = %error,
                    "Push delivery to one token failed"
                );
                report.failures.push(TokenFailure {
                    token: token.clone(),
                    error,
                });
            }
        }
    }
    report
}

/// Channel chosen from configuration: HTTP gateway when a URL is set,
/// otherwise a channel that refuses every send.
pub fn channel_from_config(config: &PushConfig) -> Result<Arc<dyn PushChannel>, PushError> {
    match config.gateway_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpPushChannel::new(
            url,
            config.api_key.clone(),
            config.timeout,
        )?)),
        None => {
            tracing::warn!("No push gateway configured; reminders will stay pending");
            Ok(Arc::new(DisabledPushChannel))
        }
    }
}

/// Web-push gateway speaking an FCM-v1-shaped JSON message.
pub struct HttpPushChannel {
    gateway_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPushChannel {
    pub fn new(gateway_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Transport(e.to_string()))?;

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout,
        })
    }
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    message: GatewayMessage<'a>,
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    token: &'a str,
    notification: GatewayNotification<'a>,
    data: &'a PushData,
    webpush: GatewayWebPush<'a>,
}

#[derive(Serialize)]
struct GatewayNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct GatewayWebPush<'a> {
    fcm_options: GatewayLink<'a>,
}

#[derive(Serialize)]
struct GatewayLink<'a> {
    link: &'a str,
}

fn gateway_request<'a>(token: &'a str, payload: &'a PushPayload) -> GatewayRequest<'a> {
    GatewayRequest {
        message: GatewayMessage {
            token,
            notification: GatewayNotification {
                title: &payload.title,
                body: &payload.body,
            },
            data: &payload.data,
            webpush: GatewayWebPush {
                fcm_options: GatewayLink {
                    link: &payload.data.url,
                },
            },
        },
    }
}

/// Map a non-success gateway response to an error.
fn classify_rejection(token: &str, status: u16, body: String) -> PushError {
    // INVALID_ARGUMENT also covers payload problems, so it never prunes a token.
    const UNREGISTERED_MARKERS: &[&str] = &["UNREGISTERED", "registration-token-not-registered"];

    let unregistered = matches!(status, 404 | 410)
        || (status == 400 && UNREGISTERED_MARKERS.iter().any(|m| body.contains(m)));
    if unregistered {
        PushError::InvalidToken(token.to_string())
    } else {
        PushError::Rejected { status, body }
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), PushError> {
        let mut request = self
            .client
            .post(&self.gateway_url)
            .json(&gateway_request(token, payload));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PushError::Transport(format!(
                    "Request timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                PushError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_rejection(token, status.as_u16(), body))
    }
}

/// Used when no gateway is configured.
pub struct DisabledPushChannel;

#[async_trait]
impl PushChannel for DisabledPushChannel {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, _token: &str, _payload: &PushPayload) -> Result<(), PushError> {
        Err(PushError::Transport("push delivery is not configured".into()))
    }
}
