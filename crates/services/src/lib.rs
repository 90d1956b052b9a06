pub mod auth;
pub mod dao;
pub mod ledger;

pub use auth::AuthService;
pub use dao::*;
pub use ledger::UserLedger;
