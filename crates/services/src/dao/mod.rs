pub mod base;
pub mod credit;
pub mod history;
pub mod payment;
pub mod user;

pub use base::BaseDao;
pub use credit::CreditDao;
pub use history::HistoryDao;
pub use payment::PaymentDao;
pub use user::UserDao;
