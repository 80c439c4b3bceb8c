// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Typed failures raised while building pipelines or splitting
// clients. Everything here is reported synchronously, at
// construction time, and none of it is retried.
//
// The application layer returns anyhow::Result; these variants
// travel inside it and can be recovered with downcast_ref.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Neither an epoch count nor a batch cap bounds the stream.
    #[error("either num_epochs ({num_epochs}) or max_batches ({max_batches}) must be non-negative")]
    UnboundedStream { num_epochs: i64, max_batches: i64 },

    /// Batches must hold at least one record.
    #[error("batch_size must be a positive integer")]
    InvalidBatchSize,

    /// A role that always needs at least one full pass got fewer.
    #[error("{role} must be a positive integer, got {value}")]
    NonPositiveEpochs { role: &'static str, value: i64 },

    /// The task name is not one of the supported kinds.
    #[error("emnist task must be one of \"digit_recognition\" or \"autoencoder\", got \"{0}\"")]
    UnknownTask(String),

    /// Train and test partitions disagree on which clients exist.
    #[error(
        "train and test client ids differ: {only_in_train} only in train, {only_in_test} only in test"
    )]
    ClientIdMismatch { only_in_train: usize, only_in_test: usize },

    /// A client id that the collection does not contain.
    #[error("unknown client id '{0}'")]
    UnknownClient(String),

    /// A stored record that cannot be turned into a batch row.
    #[error("invalid record for client '{client_id}': {reason}")]
    InvalidRecord { client_id: String, reason: String },
}
