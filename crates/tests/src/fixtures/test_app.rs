use std::net::SocketAddr;
use std::sync::Arc;

use mongodb::{Client, Database, options::ClientOptions};
use scribeflow_api::{build_router, state::AppState};
use scribeflow_billing::{ProviderRegistry, SpeechProvider};
use scribeflow_config::Settings;
use scribeflow_db::indexes::ensure_indexes;
use tokio::net::TcpListener;

/// A running test application with its own MongoDB database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test server connected to the test MongoDB.
    ///
    /// Requires a running MongoDB at localhost:27017.
    /// Set SCRIBEFLOW__DATABASE__URL env var to override the connection
    /// string. Each test gets a unique database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_inner(None).await
    }

    /// Spawn a test server whose speech sessions run against the given
    /// provider instead of a real STT vendor.
    pub async fn spawn_with_provider(provider: Arc<dyn SpeechProvider>) -> Self {
        Self::spawn_inner(Some(Arc::new(ProviderRegistry::fixed(provider)))).await
    }

    async fn spawn_inner(providers: Option<Arc<ProviderRegistry>>) -> Self {
        let db_name = format!("scribeflow_test_{}", uuid::Uuid::new_v4().simple());

        let mut settings = Settings::load().unwrap_or_else(|_| test_settings());
        if let Ok(url) = std::env::var("SCRIBEFLOW__DATABASE__URL") {
            settings.database.url = url;
        }
        settings.database.name = db_name.clone();

        let client_options = ClientOptions::parse(&settings.database.url)
            .await
            .expect("Failed to parse MongoDB URL");
        let mongo_client =
            Client::with_options(client_options).expect("Failed to create MongoDB client");
        let db = mongo_client.database(&db_name);

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let app_state = match providers {
            Some(providers) => AppState::with_providers(db.clone(), settings.clone(), providers),
            None => AppState::new(db.clone(), settings.clone()),
        };
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            db,
            settings,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}

fn test_settings() -> Settings {
    Settings {
        app: scribeflow_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: scribeflow_config::DatabaseSettings {
            url: "mongodb://localhost:27017".to_string(),
            name: "scribeflow_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        jwt: scribeflow_config::JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 604800,
            issuer: "scribeflow".to_string(),
        },
        credits: scribeflow_config::CreditSettings { welcome_grant: 999 },
        speech: scribeflow_config::SpeechSettings {
            soniox_api_key: None,
            soniox_url: "wss://stt-rt.soniox.com/transcribe-websocket".to_string(),
            soniox_model: "stt-rt-preview".to_string(),
            deepgram_api_key: None,
            deepgram_url: "wss://api.deepgram.com/v1/listen".to_string(),
            deepgram_model: "nova-2".to_string(),
        },
    }
}
