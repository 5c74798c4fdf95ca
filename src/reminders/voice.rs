//! Deliver-then-speak hand-off.
//!
//! The background agent receives the notification click and posts a tagged
//! message to the client window, which speaks the text it carries. The two
//! sides only share the channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::push::PushData;

/// Message posted from the background agent to a client window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "PLAY_SPEAKING_MESSAGE")]
    PlaySpeakingMessage { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No active client window")]
    NoActiveClient,

    #[error("Speech synthesis failed: {0}")]
    Speech(String),
}

/// Text-to-speech capability of a client.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), RelayError>;
}

/// Create a connected agent/window pair.
pub fn speech_channel(capacity: usize) -> (BackgroundAgent, ClientWindow) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BackgroundAgent { tx }, ClientWindow { rx })
}

#[derive(Clone)]
pub struct BackgroundAgent {
    tx: mpsc::Sender<ClientMessage>,
}

impl BackgroundAgent {
    /// Forward the notification's speak text to the client window.
    pub async fn on_notification_click(&self, data: &PushData) -> Result<(), RelayError> {
        let text = data.message.trim();
        if text.is_empty() {
            tracing::debug!(url = %data.url, "Notification carries no speech text");
            return Ok(());
        }
        self.tx
            .send(ClientMessage::PlaySpeakingMessage {
                message: text.to_string(),
            })
            .await
            .map_err(|_| RelayError::NoActiveClient)
    }

    pub fn has_active_client(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct ClientWindow {
    rx: mpsc::Receiver<ClientMessage>,
}

impl ClientWindow {
    /// Next message, or `None` once every agent is gone.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.rx.recv().await
    }

    /// Wait for the next message and speak it. Returns the spoken text.
    pub async fn play_next(&mut self, speaker: &dyn Speaker) -> Result<Option<String>, RelayError> {
        match self.recv().await {
            Some(ClientMessage::PlaySpeakingMessage { message }) => {
                speaker.speak(&message)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}
