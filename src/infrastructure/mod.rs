pub mod artifact_store;
pub mod csv_trades;
pub mod persistence;
pub mod repositories;

pub use artifact_store::{ArtifactStore, ModelArtifact};
pub use csv_trades::CsvTradeStore;
pub use persistence::{Database, SqliteTradeStore};
pub use repositories::InMemoryTradeStore;
