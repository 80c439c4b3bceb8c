// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipelines never talk to a concrete storage backend.
// They see two traits:
//
//   ClientData       → one partition (train or test), keyed by
//                      client id, able to hand out each client's
//                      records as a burn Dataset
//
//   ClientDataSource → anything that can load the paired
//                      (train, test) partitions for a label universe
//
// Implementations:
//   - InMemoryClientData / InMemorySource → records held in memory
//   - JsonClientSource                    → JSON files on disk
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Burn Book §4 (Datasets)

use std::sync::Arc;

use anyhow::Result;
use burn::data::dataset::{transform::ComposedDataset, Dataset};

use crate::domain::record::EmnistItem;

/// Shared, read-only handle to one stream of raw records.
pub type ClientDataset = Arc<dyn Dataset<EmnistItem>>;

// ─── ClientData ───────────────────────────────────────────────────────────────
/// One partition of a writer-keyed dataset.
pub trait ClientData: Send + Sync {
    /// Every client id in this partition, in a stable order.
    fn client_ids(&self) -> Vec<String>;

    /// The records belonging to `client_id`.
    /// Unknown ids are an error, not an empty dataset.
    fn create_dataset(&self, client_id: &str) -> Result<ClientDataset>;

    /// All clients' records pooled into a single dataset,
    /// concatenated in `client_ids()` order.
    fn create_dataset_from_all_clients(&self) -> Result<ClientDataset> {
        let parts = self
            .client_ids()
            .iter()
            .map(|id| self.create_dataset(id))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(ComposedDataset::new(parts)))
    }
}

// ─── ClientDataSource ─────────────────────────────────────────────────────────
/// Loads the paired (train, test) partitions.
///
/// `only_digits` picks the 10-class universe when true and the
/// 62-class one otherwise. Each call is an independent load.
pub trait ClientDataSource {
    fn load_data(&self, only_digits: bool) -> Result<(Arc<dyn ClientData>, Arc<dyn ClientData>)>;
}
