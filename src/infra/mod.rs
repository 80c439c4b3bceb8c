// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   config_store.rs — Config persistence
//                     Saves/loads FederatedConfig,
//                     CentralizedConfig and P13nConfig as
//                     pretty JSON so runs can be reproduced.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// JSON persistence for pipeline configs
pub mod config_store;
