/// Streaming STT provider configuration for the session layer.
///
/// Mirrors the `speech` section of the application settings so this crate
/// stays free of the config loader.
#[derive(Debug, Clone, Default)]
pub struct SpeechConfig {
    pub soniox_api_key: Option<String>,
    pub soniox_url: String,
    pub soniox_model: String,
    pub deepgram_api_key: Option<String>,
    pub deepgram_url: String,
    pub deepgram_model: String,
}
