pub mod deepgram;
pub mod soniox;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::SessionError;
use crate::config::SpeechConfig;

pub use deepgram::DeepgramProvider;
pub use soniox::SonioxProvider;

/// Events coming out of a provider connection.
#[derive(Debug)]
pub enum ProviderEvent {
    Transcript {
        text: String,
        is_final: bool,
        confidence: Option<f64>,
    },
    Closed,
    Error(String),
}

/// A live connection to a streaming STT provider: audio frames go in,
/// transcript/lifecycle events come out.
pub struct ProviderSession {
    pub audio_tx: mpsc::Sender<Vec<u8>>,
    pub events: mpsc::Receiver<ProviderEvent>,
}

#[async_trait]
pub trait SpeechProvider: Send + Sync + 'static {
    /// Establishes a streaming session for the given BCP-47 language tag.
    async fn open(&self, language: &str) -> Result<ProviderSession, SessionError>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn SpeechProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Hands out the provider selected by language, constructing each backend
/// lazily on first use. Only the selected backend ever exists; nothing is
/// instantiated for languages nobody asked for.
pub struct ProviderRegistry {
    config: SpeechConfig,
    providers: DashMap<&'static str, Arc<dyn SpeechProvider>>,
    fixed: Option<Arc<dyn SpeechProvider>>,
}

impl ProviderRegistry {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            providers: DashMap::new(),
            fixed: None,
        }
    }

    /// A registry that always hands out the given provider, whatever the
    /// language. Used by tests to run sessions against a scripted backend.
    pub fn fixed(provider: Arc<dyn SpeechProvider>) -> Self {
        Self {
            config: SpeechConfig::default(),
            providers: DashMap::new(),
            fixed: Some(provider),
        }
    }

    /// Resolves the provider for a language: Soniox for Bangla, Deepgram for
    /// everything else. Fails with a configuration error before any
    /// connection attempt when the selected provider's key is missing.
    pub fn for_language(&self, language: &str) -> Result<Arc<dyn SpeechProvider>, SessionError> {
        if let Some(provider) = &self.fixed {
            return Ok(provider.clone());
        }

        if language == "bn-BD" {
            self.get_or_build("soniox", || {
                let api_key = self
                    .config
                    .soniox_api_key
                    .clone()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        SessionError::Configuration("speech.soniox_api_key".to_string())
                    })?;
                Ok(Arc::new(SonioxProvider::new(
                    api_key,
                    self.config.soniox_url.clone(),
                    self.config.soniox_model.clone(),
                )))
            })
        } else {
            self.get_or_build("deepgram", || {
                let api_key = self
                    .config
                    .deepgram_api_key
                    .clone()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        SessionError::Configuration("speech.deepgram_api_key".to_string())
                    })?;
                Ok(Arc::new(DeepgramProvider::new(
                    api_key,
                    self.config.deepgram_url.clone(),
                    self.config.deepgram_model.clone(),
                )))
            })
        }
    }

    fn get_or_build<F>(
        &self,
        name: &'static str,
        build: F,
    ) -> Result<Arc<dyn SpeechProvider>, SessionError>
    where
        F: FnOnce() -> Result<Arc<dyn SpeechProvider>, SessionError>,
    {
        if let Some(provider) = self.providers.get(name) {
            return Ok(provider.clone());
        }

        let provider = build()?;
        info!(provider = name, "speech backend initialized");
        self.providers.insert(name, provider.clone());
        Ok(provider)
    }
}
