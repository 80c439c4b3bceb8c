// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the system
// works with: records, the task kind, the errors, and the
// client-keyed data abstractions.
//
// Rules for this layer:
//   - NO tensor types here (those live in data::batcher)
//   - NO file I/O (that's data::loader and infra)
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// A raw (label, pixels) record plus EMNIST constants
pub mod record;

// The closed set of supported tasks
pub mod task;

// Typed configuration and data-consistency errors
pub mod error;

// ClientData and ClientDataSource
pub mod traits;
