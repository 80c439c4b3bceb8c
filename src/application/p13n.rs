// ============================================================
// Layer 2 — Personalization Dataset Assembler
// ============================================================
// Splits the client universe into training clients and held-out
// test clients, then hands back two per-client constructors:
//
//   P13nTrainCtor(id) → train ++ test records ──inner-train──► stream
//
//   P13nEvalCtor(id)  → train records ──inner-eval──► train_data
//                       test records  ──outer-eval──► test_data
//
// The outer-eval transform is always one unshuffled pass so the
// final score is computed on every held-out record exactly once.
//
// Both partitions must list the same client ids. A mismatch means
// the store is corrupt and fails the call before any split.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use burn::data::dataset::transform::ComposedDataset;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::{create_preprocess_fn, PreprocessConfig, PreprocessFn};
use crate::data::splitter::{split_clients, NUM_CLIENTS_P13N_TRAIN};
use crate::data::stream::BatchStream;
use crate::domain::error::PipelineError;
use crate::domain::record::MAX_CLIENT_DATASET_SIZE;
use crate::domain::task::EmnistTask;
use crate::domain::traits::{ClientData, ClientDataSource};

// ─── P13n Configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P13nConfig {
    // Fine-tuning during personalization training
    pub train_batch_size:       usize,
    pub train_epochs:           i64,
    pub train_max_batches:      i64,

    // Fine-tuning inside evaluation, then scoring
    pub eval_batch_size:        usize,
    pub eval_inner_epochs:      i64,
    pub eval_inner_max_batches: i64,

    pub only_digits:            bool,
    pub task:                   EmnistTask,
    pub shuffle_buffer_size:    i64,
    pub num_train_clients:      usize,
    /// Fixes the client split; None draws from OS entropy
    pub seed:                   Option<u64>,
    /// Fixes the record shuffles inside each stream
    pub shuffle_seed:           Option<u64>,
}

impl Default for P13nConfig {
    fn default() -> Self {
        Self {
            train_batch_size:       20,
            train_epochs:           1,
            train_max_batches:      -1,
            eval_batch_size:        20,
            eval_inner_epochs:      1,
            eval_inner_max_batches: -1,
            only_digits:            false,
            task:                   EmnistTask::DigitRecognition,
            shuffle_buffer_size:    MAX_CLIENT_DATASET_SIZE,
            num_train_clients:      NUM_CLIENTS_P13N_TRAIN,
            seed:                   None,
            shuffle_seed:           None,
        }
    }
}

impl P13nConfig {
    fn inner_train(&self) -> PreprocessConfig {
        PreprocessConfig::new(self.train_epochs, self.train_batch_size)
            .with_max_batches(self.train_max_batches)
            .with_shuffle_buffer_size(self.shuffle_buffer_size)
            .with_task(self.task)
            .with_seed(self.shuffle_seed)
    }

    fn inner_eval(&self) -> PreprocessConfig {
        PreprocessConfig::new(self.eval_inner_epochs, self.eval_batch_size)
            .with_max_batches(self.eval_inner_max_batches)
            .with_shuffle_buffer_size(self.shuffle_buffer_size)
            .with_task(self.task)
            .with_seed(self.shuffle_seed)
    }

    fn outer_eval(&self) -> PreprocessConfig {
        PreprocessConfig::new(1, self.eval_batch_size)
            .with_shuffle_buffer_size(1)
            .with_task(self.task)
    }
}

// ─── Constructors ────────────────────────────────────────────────────────────
/// Builds the fine-tuning stream for one client.
#[derive(Clone)]
pub struct P13nTrainCtor<B: Backend> {
    train:      Arc<dyn ClientData>,
    test:       Arc<dyn ClientData>,
    preprocess: PreprocessFn<B>,
}

impl<B: Backend> P13nTrainCtor<B> {
    /// The client's train records followed by its test records,
    /// through the inner-train transform.
    pub fn build(&self, client_id: &str) -> Result<BatchStream<B>> {
        let records = ComposedDataset::new(vec![
            self.train.create_dataset(client_id)?,
            self.test.create_dataset(client_id)?,
        ]);
        Ok(self.preprocess.apply(Arc::new(records)))
    }
}

/// Fine-tune and score streams for one evaluation client.
pub struct P13nEvalData<B: Backend> {
    pub train_data: BatchStream<B>,
    pub test_data:  BatchStream<B>,
}

/// Builds the evaluation pair for one client.
#[derive(Clone)]
pub struct P13nEvalCtor<B: Backend> {
    train:      Arc<dyn ClientData>,
    test:       Arc<dyn ClientData>,
    inner_eval: PreprocessFn<B>,
    outer_eval: PreprocessFn<B>,
}

impl<B: Backend> P13nEvalCtor<B> {
    pub fn build(&self, client_id: &str) -> Result<P13nEvalData<B>> {
        Ok(P13nEvalData {
            train_data: self.inner_eval.apply(self.train.create_dataset(client_id)?),
            test_data:  self.outer_eval.apply(self.test.create_dataset(client_id)?),
        })
    }
}

/// Everything a personalization experiment needs.
pub struct P13nDatasets<B: Backend> {
    pub train_client_ids: Vec<String>,
    pub test_client_ids:  Vec<String>,
    pub train_ctor:       P13nTrainCtor<B>,
    pub eval_ctor:        P13nEvalCtor<B>,
}

/// Load EMNIST, split its clients, and build the per-client constructors.
///
/// # Errors
/// Any preprocessing error, any error from the source, and
/// `ClientIdMismatch` when the partitions disagree on client ids.
pub fn get_federated_p13n_datasets<B: Backend>(
    source: &dyn ClientDataSource,
    config: &P13nConfig,
    device: &B::Device,
) -> Result<P13nDatasets<B>> {
    // ── Step 1: Transforms ───────────────────────────────────────────────────
    let inner_train = create_preprocess_fn::<B>(&config.inner_train(), device)?;
    let inner_eval = create_preprocess_fn::<B>(&config.inner_eval(), device)?;
    let outer_eval = create_preprocess_fn::<B>(&config.outer_eval(), device)?;

    // ── Step 2: Load and check that both partitions agree ────────────────────
    let (train, test) = source.load_data(config.only_digits)?;
    let client_ids = matching_client_ids(train.as_ref(), test.as_ref())?;

    // ── Step 3: Split the ids ────────────────────────────────────────────────
    let (train_client_ids, test_client_ids) =
        split_clients(client_ids, config.num_train_clients, config.seed);

    tracing::info!(
        "P13n EMNIST (only_digits={}, task={}): {} training clients, {} test clients",
        config.only_digits,
        config.task,
        train_client_ids.len(),
        test_client_ids.len(),
    );

    Ok(P13nDatasets {
        train_client_ids,
        test_client_ids,
        train_ctor: P13nTrainCtor {
            train:      train.clone(),
            test:       test.clone(),
            preprocess: inner_train,
        },
        eval_ctor: P13nEvalCtor { train, test, inner_eval, outer_eval },
    })
}

/// The shared id list, or `ClientIdMismatch` with how far the sets diverge.
fn matching_client_ids(train: &dyn ClientData, test: &dyn ClientData) -> Result<Vec<String>, PipelineError> {
    let train_ids: BTreeSet<String> = train.client_ids().into_iter().collect();
    let test_ids: BTreeSet<String> = test.client_ids().into_iter().collect();

    if train_ids != test_ids {
        let err = PipelineError::ClientIdMismatch {
            only_in_train: train_ids.difference(&test_ids).count(),
            only_in_test:  test_ids.difference(&train_ids).count(),
        };
        tracing::error!("{}", err);
        return Err(err);
    }
    Ok(train_ids.into_iter().collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    use crate::application::fixtures::{self, client_id, TestBackend};

    fn load(config: &P13nConfig) -> Result<P13nDatasets<TestBackend>> {
        get_federated_p13n_datasets::<TestBackend>(&fixtures::source(10, 4, 3), config, &Default::default())
    }

    fn seeded(num_train_clients: usize) -> P13nConfig {
        P13nConfig { num_train_clients, seed: Some(42), ..Default::default() }
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let config = P13nConfig::default();
        assert_eq!(config.num_train_clients, 2500);
        assert_eq!(config.shuffle_buffer_size, 418);
        assert_eq!(config.train_max_batches, -1);
        assert_eq!(config.eval_batch_size, 20);
    }

    #[test]
    fn test_split_sizes_and_partition() {
        let datasets = load(&seeded(7)).unwrap();
        assert_eq!(datasets.train_client_ids.len(), 7);
        assert_eq!(datasets.test_client_ids.len(), 3);

        let mut all: Vec<String> = datasets
            .train_client_ids
            .iter()
            .chain(&datasets.test_client_ids)
            .cloned()
            .collect();
        all.sort();
        assert_eq!(all, (0..10).map(client_id).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        let first = load(&seeded(4)).unwrap();
        let second = load(&seeded(4)).unwrap();
        assert_eq!(first.train_client_ids, second.train_client_ids);
        assert_eq!(first.test_client_ids, second.test_client_ids);
    }

    #[test]
    fn test_default_count_clamps_to_available_clients() {
        let datasets = load(&P13nConfig { seed: Some(1), ..Default::default() }).unwrap();
        assert_eq!(datasets.train_client_ids.len(), 10);
        assert!(datasets.test_client_ids.is_empty());
    }

    #[test]
    fn test_mismatched_ids_fail_before_split() {
        let source = fixtures::mismatched_source(5, 2);
        let err = get_federated_p13n_datasets::<TestBackend>(&source, &seeded(3), &Default::default())
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::ClientIdMismatch { only_in_train: 2, only_in_test: 0 })
        );
    }

    #[test]
    fn test_train_ctor_concatenates_train_then_test() {
        let config = P13nConfig { train_batch_size: 100, shuffle_buffer_size: 1, ..seeded(5) };
        let datasets = load(&config).unwrap();

        let stream = datasets.train_ctor.build("f0003").unwrap();
        assert_eq!(stream.num_records(), 7);
        let labels: Vec<Vec<i64>> = stream.iter().map(fixtures::labels).collect();
        assert_eq!(labels, vec![vec![1, 1, 1, 1, 2, 2, 2]]);
    }

    #[test]
    fn test_train_ctor_respects_cap() {
        let config = P13nConfig {
            train_batch_size: 2,
            train_epochs: 0,
            train_max_batches: 5,
            ..seeded(5)
        };
        let datasets = load(&config).unwrap();
        assert_eq!(datasets.train_ctor.build("f0000").unwrap().iter().count(), 5);
    }

    #[test]
    fn test_eval_ctor_returns_labeled_pair() {
        let config = P13nConfig { eval_batch_size: 2, eval_inner_epochs: 2, ..seeded(5) };
        let datasets = load(&config).unwrap();
        let eval = datasets.eval_ctor.build("f0009").unwrap();

        let inner: Vec<i64> = eval.train_data.iter().flat_map(fixtures::labels).collect();
        assert_eq!(inner, vec![1; 8]);

        assert_eq!(eval.test_data.plan().shuffle_buffer(), 1);
        let sizes: Vec<usize> = eval.test_data.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        let outer: Vec<i64> = eval.test_data.iter().flat_map(fixtures::labels).collect();
        assert_eq!(outer, vec![2, 2, 2]);
    }

    #[test]
    fn test_unbounded_inner_eval_is_rejected() {
        let config = P13nConfig { eval_inner_epochs: -1, eval_inner_max_batches: -1, ..seeded(5) };
        let err = load(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnboundedStream { .. })
        ));
    }

    #[test]
    fn test_unknown_client_in_constructors() {
        let datasets = load(&seeded(5)).unwrap();
        let err = datasets.train_ctor.build("nobody").err().unwrap();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::UnknownClient("nobody".to_string()))
        );
        assert!(datasets.eval_ctor.build("nobody").is_err());
    }
}
