// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a client store on disk and a stream of
// tensor batches.
//
// The pipeline flows in this order:
//
//   JSON client store
//       │
//       ▼
//   JsonClientSource   → reads and validates per-client records
//       │
//       ▼
//   InMemoryClientData → client id → burn Dataset of records
//       │
//       ▼
//   PreprocessFn       → validated knobs, applied per client or pooled
//       │
//       ▼
//   BatchStream        → lazy shuffle → repeat → batch → take
//       │
//       ▼
//   EmnistBatcher      → (input, target) tensors for the task
//
// splitter.rs sits beside the flow: it partitions client ids
// for personalization.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads the on-disk JSON client store
pub mod loader;

/// In-memory client collections and grid-shape checks
pub mod client_data;

/// Builds validated preprocessing functions from raw knobs
pub mod preprocessor;

/// Lazy, restartable shuffle/repeat/batch/take streams
pub mod stream;

/// Implements Burn's Batcher trait for both EMNIST tasks
pub mod batcher;

/// Seeded train/test partition of client ids
pub mod splitter;
