use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::{ProviderEvent, ProviderSession, SpeechProvider};
use crate::SessionError;

/// Deepgram live STT over WebSocket (`/v1/listen`).
pub struct DeepgramProvider {
    api_key: String,
    url: String,
    model: String,
}

impl DeepgramProvider {
    pub fn new(api_key: String, url: String, model: String) -> Self {
        Self {
            api_key,
            url,
            model,
        }
    }

    fn listen_url(&self, language: &str) -> String {
        format!(
            "{}?language={}&model={}&smart_format=true&interim_results=false",
            self.url, language, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    channel: Option<DeepgramChannel>,
    is_final: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    confidence: Option<f64>,
}

#[async_trait]
impl SpeechProvider for DeepgramProvider {
    async fn open(&self, language: &str) -> Result<ProviderSession, SessionError> {
        let mut request = self
            .listen_url(language)
            .into_client_request()
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let auth = format!("Token {}", self.api_key)
            .parse()
            .map_err(|_| SessionError::Connect("invalid API key header".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(32);
        let (event_tx, events) = mpsc::channel(64);

        tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                if sink.send(Message::Binary(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
            debug!("deepgram audio pump finished");
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let response: DeepgramResponse = match serde_json::from_str(&text) {
                            Ok(r) => r,
                            Err(e) => {
                                warn!(%e, "unparseable deepgram frame, skipping");
                                continue;
                            }
                        };

                        let Some(alternative) = response
                            .channel
                            .and_then(|c| c.alternatives.into_iter().next())
                        else {
                            continue;
                        };
                        if alternative.transcript.is_empty() {
                            continue;
                        }

                        if event_tx
                            .send(ProviderEvent::Transcript {
                                text: alternative.transcript,
                                is_final: response.is_final.unwrap_or(false),
                                confidence: alternative.confidence,
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
        "deepgram"
    }
}
