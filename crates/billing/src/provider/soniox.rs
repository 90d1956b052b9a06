use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::{ProviderEvent, ProviderSession, SpeechProvider};
use crate::SessionError;

/// Soniox realtime STT over WebSocket.
///
/// The first frame on the wire is a JSON start request carrying the API key
/// and model; afterwards binary audio goes up and token batches come down.
/// Tokens are flagged `is_final` individually — finals are concatenated into
/// one final transcript fragment per batch, the rest into an interim one.
pub struct SonioxProvider {
    api_key: String,
    url: String,
    model: String,
}

impl SonioxProvider {
    pub fn new(api_key: String, url: String, model: String) -> Self {
        Self {
            api_key,
            url,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SonioxResponse {
    #[serde(default)]
    tokens: Vec<SonioxToken>,
    confidence: Option<f64>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SonioxToken {
    text: Option<String>,
    #[serde(default)]
    is_final: bool,
}

#[async_trait]
impl SpeechProvider for SonioxProvider {
    async fn open(&self, language: &str) -> Result<ProviderSession, SessionError> {
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let start = serde_json::json!({
            "api_key": self.api_key,
            "audio_format": "auto",
            "model": self.model,
            "language_hints": [primary_subtag(language)],
        });
        sink.send(Message::Text(start.to_string().into()))
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(32);
        let (event_tx, events) = mpsc::channel(64);

        // Audio pump: dropping the sender closes the provider write side.
        tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                if sink.send(Message::Binary(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
            debug!("soniox audio pump finished");
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let response: SonioxResponse = match serde_json::from_str(&text) {
                            Ok(r) => r,
                            Err(e) => {
                                warn!(%e, "unparseable soniox frame, skipping");
                                continue;
                            }
                        };

                        if let Some(code) = response.error_code {
                            let message = response.error_message.unwrap_or_default();
                            let _ = event_tx
                                .send(ProviderEvent::Error(format!("soniox {code}: {message}")))
                                .await;
                            return;
                        }

                        let mut final_text = String::new();
                        let mut interim_text = String::new();
                        for token in &response.tokens {
                            if let Some(text) = &token.text {
                                if token.is_final {
                                    final_text.push_str(text);
                                } else {
                                    interim_text.push_str(text);
                                }
                            }
                        }

                        if !final_text.is_empty()
                            && event_tx
                                .send(ProviderEvent::Transcript {
                                    text: final_text,
                                    is_final: true,
                                    confidence: response.confidence,
                                })
                                .await
                                .is_err()
                        {
                            return;
                        }
                        if !interim_text.is_empty()
                            && event_tx
                                .send(ProviderEvent::Transcript {
                                    text: interim_text,
                                    is_final: false,
                                    confidence: response.confidence,
                                })
                                .await
                                .is_err()
                        {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        let _ = event_tx.send(ProviderEvent::Closed).await;
                        return;
                    }
                    Err(e) => {
                        let _ = event_tx.send(ProviderEvent::Error(e.to_string())).await;
                        return;
                    }
                    _ => {}
                }
            }
            let _ = event_tx.send(ProviderEvent::Closed).await;
        });

        Ok(ProviderSession { audio_tx, events })
    }

    fn name(&self) -> &str {
        "soniox"
    }
}

/// "bn-BD" → "bn"; Soniox takes bare language hints.
fn primary_subtag(language: &str) -> &str {
    language.split('-').next().unwrap_or(language)
}
