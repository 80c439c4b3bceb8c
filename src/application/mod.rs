// ============================================================
// Layer 2 — Application / Assemblers
// ============================================================
// Each assembler loads the paired client partitions, builds the
// preprocessing functions it needs, and wires them together.
//
//   federated.rs   — per-client train/test collections, lazily
//                    preprocessed on every access
//   centralized.rs — every client pooled into one train stream
//                    and one test stream
//   p13n.rs        — seeded split of clients plus per-client
//                    fine-tune / evaluate constructors
//
// Rules for this layer:
//   - No tensor code here (that's data::batcher)
//   - No file access here (that's data::loader)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Federated train/test client collections
pub mod federated;

/// Pooled train/test streams
pub mod centralized;

/// Personalization client split and dataset constructors
pub mod p13n;
