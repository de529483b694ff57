pub mod database;
pub mod trade_repository;

pub use database::Database;
pub use trade_repository::SqliteTradeStore;
