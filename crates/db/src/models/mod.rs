pub mod credit_transaction;
pub mod history;
pub mod payment;
pub mod user;

pub use credit_transaction::{CreditTransaction, TransactionType};
pub use history::{HistoryEntry, HistoryKind};
pub use payment::{Payment, PaymentStatus};
pub use user::{Plan, User, UserRole};
