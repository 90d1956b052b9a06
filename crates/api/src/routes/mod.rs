pub mod admin;
pub mod auth;
pub mod credit;
pub mod history;
pub mod payment;
