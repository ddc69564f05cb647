//! Data module - retrieval, snapshots, and schema normalization

mod fetcher;
mod normalizer;
mod snapshot;
pub mod table;

pub use fetcher::CkanClient;
pub use normalizer::{concat, normalize};
pub use snapshot::SnapshotStore;
