// ============================================================
// emnist-fl — EMNIST data pipelines for federated learning
// ============================================================
// Loads handwritten-character images partitioned by writer
// ("client") and turns them into lazy batch streams for three
// usage modes:
//
//   federated   — per-client train/test streams
//   centralized — all clients pooled into one train and one
//                 test stream
//   p13n        — seeded client split plus per-client
//                 fine-tune / evaluate constructors
//
// Layers, top to bottom:
//
//   application — assemblers for the three modes
//   domain      — records, task kind, errors, client traits
//   data        — store loader, preprocessing, streams, batcher
//   infra       — config persistence
//
// Reference: Rust Book §7 (Packages, Crates, and Modules)

#![recursion_limit = "256"]

pub mod application;
pub mod data;
pub mod domain;
pub mod infra;

pub use application::centralized::{get_centralized_datasets, CentralizedConfig};
pub use application::federated::{get_federated_datasets, FederatedConfig, PreprocessedClientData};
pub use application::p13n::{
    get_federated_p13n_datasets, P13nConfig, P13nDatasets, P13nEvalCtor, P13nEvalData, P13nTrainCtor,
};
pub use data::batcher::{EmnistBatch, EmnistBatcher};
pub use data::client_data::{GridShape, InMemoryClientData, InMemorySource};
pub use data::loader::JsonClientSource;
pub use data::preprocessor::{create_preprocess_fn, PreprocessConfig, PreprocessFn};
pub use data::splitter::{split_clients, NUM_CLIENTS_P13N_TRAIN};
pub use data::stream::{BatchStream, PipelinePlan, Repeat};
pub use domain::error::PipelineError;
pub use domain::record::{num_classes, EmnistItem, IMAGE_SIZE, MAX_CLIENT_DATASET_SIZE};
pub use domain::task::EmnistTask;
pub use domain::traits::{ClientData, ClientDataSource, ClientDataset};
pub use infra::config_store::ConfigStore;
