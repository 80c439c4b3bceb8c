// ============================================================
// Layer 2 — Federated Dataset Assembler
// ============================================================
// Builds the per-client collections used by federated training:
//
//   Step 1: Validate epochs for both roles
//   Step 2: Load (train, test) partitions for the label universe
//   Step 3: Build one PreprocessFn per role
//   Step 4: Wrap each partition so every client access is
//           preprocessed on the fly
//
// Nothing is materialized. Asking for a client's dataset asks
// the underlying partition again and composes a fresh stream.

use std::sync::Arc;

use anyhow::Result;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::{create_preprocess_fn, PreprocessConfig, PreprocessFn};
use crate::data::stream::BatchStream;
use crate::domain::error::PipelineError;
use crate::domain::record::MAX_CLIENT_DATASET_SIZE;
use crate::domain::task::EmnistTask;
use crate::domain::traits::{ClientData, ClientDataSource};

// ─── Federated Configuration ─────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederatedConfig {
    pub train_client_batch_size:       usize,
    pub test_client_batch_size:        usize,
    pub train_client_epochs_per_round: i64,
    pub test_client_epochs_per_round:  i64,
    pub train_shuffle_buffer_size:     i64,
    pub test_shuffle_buffer_size:      i64,
    pub only_digits:                   bool,
    pub task:                          EmnistTask,
    /// Pins client-side shuffles; None reshuffles on every iteration
    pub shuffle_seed:                  Option<u64>,
}

impl Default for FederatedConfig {
    fn default() -> Self {
        Self {
            train_client_batch_size:       20,
            test_client_batch_size:        100,
            train_client_epochs_per_round: 1,
            test_client_epochs_per_round:  1,
            train_shuffle_buffer_size:     MAX_CLIENT_DATASET_SIZE,
            test_shuffle_buffer_size:      1,
            only_digits:                   false,
            task:                          EmnistTask::DigitRecognition,
            shuffle_seed:                  None,
        }
    }
}

impl FederatedConfig {
    fn train_preprocess(&self) -> PreprocessConfig {
        PreprocessConfig::new(self.train_client_epochs_per_round, self.train_client_batch_size)
            .with_shuffle_buffer_size(self.train_shuffle_buffer_size)
            .with_task(self.task)
            .with_seed(self.shuffle_seed)
    }

    fn test_preprocess(&self) -> PreprocessConfig {
        PreprocessConfig::new(self.test_client_epochs_per_round, self.test_client_batch_size)
            .with_shuffle_buffer_size(self.test_shuffle_buffer_size)
            .with_task(self.task)
            .with_seed(self.shuffle_seed)
    }
}

// ─── PreprocessedClientData ──────────────────────────────────────────────────
/// A client partition whose datasets come out preprocessed.
#[derive(Clone)]
pub struct PreprocessedClientData<B: Backend> {
    inner:      Arc<dyn ClientData>,
    preprocess: PreprocessFn<B>,
}

impl<B: Backend> PreprocessedClientData<B> {
    pub fn new(inner: Arc<dyn ClientData>, preprocess: PreprocessFn<B>) -> Self {
        Self { inner, preprocess }
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.inner.client_ids()
    }

    /// Fetch `client_id`'s records and compose the pipeline over them.
    pub fn create_dataset(&self, client_id: &str) -> Result<BatchStream<B>> {
        let records = self.inner.create_dataset(client_id)?;
        Ok(self.preprocess.apply(records))
    }

    pub fn preprocess_fn(&self) -> &PreprocessFn<B> {
        &self.preprocess
    }
}

/// Load federated EMNIST and attach client-side preprocessing.
///
/// # Errors
/// `NonPositiveEpochs` if either role's epochs is below 1, any error
/// from `create_preprocess_fn`, and any error from the source.
pub fn get_federated_datasets<B: Backend>(
    source: &dyn ClientDataSource,
    config: &FederatedConfig,
    device: &B::Device,
) -> Result<(PreprocessedClientData<B>, PreprocessedClientData<B>)> {
    // ── Step 1: Both roles need at least one full pass ────────────────────────
    if config.train_client_epochs_per_round < 1 {
        return Err(PipelineError::NonPositiveEpochs {
            role:  "train_client_epochs_per_round",
            value: config.train_client_epochs_per_round,
        }
        .into());
    }
    if config.test_client_epochs_per_round < 1 {
        return Err(PipelineError::NonPositiveEpochs {
            role:  "test_client_epochs_per_round",
            value: config.test_client_epochs_per_round,
        }
        .into());
    }

    // ── Step 2: Build the transforms before touching any data ────────────────
    let train_preprocess = create_preprocess_fn::<B>(&config.train_preprocess(), device)?;
    let test_preprocess = create_preprocess_fn::<B>(&config.test_preprocess(), device)?;

    // ── Step 3: Load the paired partitions ───────────────────────────────────
    let (train, test) = source.load_data(config.only_digits)?;

    tracing::info!(
        "Federated EMNIST (only_digits={}, task={}): {} train clients, {} test clients",
        config.only_digits,
        config.task,
        train.client_ids().len(),
        test.client_ids().len(),
    );

    // ── Step 4: Attach preprocessing lazily ──────────────────────────────────
    Ok((
        PreprocessedClientData::new(train, train_preprocess),
        PreprocessedClientData::new(test, test_preprocess),
    ))
}
