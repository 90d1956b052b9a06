use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub credits: CreditSettings,
    pub speech: SpeechSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreditSettings {
    /// Credits granted to every new account, recorded as a bonus transaction.
    pub welcome_grant: i64,
}

/// Streaming STT provider credentials and endpoints. A provider with no
/// API key configured refuses sessions before any connection is attempted.
#[derive(Debug, Deserialize, Clone)]
pub struct SpeechSettings {
    pub soniox_api_key: Option<String>,
    pub soniox_url: String,
    pub soniox_model: String,
    pub deepgram_api_key: Option<String>,
    pub deepgram_url: String,
    pub deepgram_model: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("SCRIBEFLOW"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "scribeflow")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "scribeflow")?
            .set_default("credits.welcome_grant", 999)?
            .set_default("speech.soniox_api_key", None::<String>)?
            .set_default(
                "speech.soniox_url",
                "wss://stt-rt.soniox.com/transcribe-websocket",
            )?
            .set_default("speech.soniox_model", "stt-rt-preview")?
            .set_default("speech.deepgram_api_key", None::<String>)?
            .set_default("speech.deepgram_url", "wss://api.deepgram.com/v1/listen")?
            .set_default("speech.deepgram_model", "nova-2")?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
