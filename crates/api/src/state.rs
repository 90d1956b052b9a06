use mongodb::Database;
use scribeflow_billing::{ProviderRegistry, SpeechConfig};
use scribeflow_config::Settings;
use scribeflow_services::{
    AuthService,
    dao::{credit::CreditDao, history::HistoryDao, payment::PaymentDao, user::UserDao},
};
use std::sync::Arc;

use crate::ws::storage::WsStorage;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub credits: Arc<CreditDao>,
    pub payments: Arc<PaymentDao>,
    pub history: Arc<HistoryDao>,
    pub providers: Arc<ProviderRegistry>,
    pub ws_storage: Arc<WsStorage>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        let providers = Arc::new(ProviderRegistry::new(speech_config(&settings)));
        Self::with_providers(db, settings, providers)
    }

    /// Like `new`, but with a caller-supplied provider registry. Tests use
    /// this to run sessions against a scripted speech backend.
    pub fn with_providers(
        db: Database,
        settings: Settings,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(&db));
        let credits = Arc::new(CreditDao::new(&db));
        let payments = Arc::new(PaymentDao::new(&db));
        let history = Arc::new(HistoryDao::new(&db));
        let ws_storage = Arc::new(WsStorage::new());

        Self {
            db,
            settings,
            auth,
            users,
            credits,
            payments,
            history,
            providers,
            ws_storage,
        }
    }
}

fn speech_config(settings: &Settings) -> SpeechConfig {
    SpeechConfig {
        soniox_api_key: settings.speech.soniox_api_key.clone(),
        soniox_url: settings.speech.soniox_url.clone(),
        soniox_model: settings.speech.soniox_model.clone(),
        deepgram_api_key: settings.speech.deepgram_api_key.clone(),
        deepgram_url: settings.speech.deepgram_url.clone(),
        deepgram_model: settings.speech.deepgram_model.clone(),
    }
}
