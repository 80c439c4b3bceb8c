// ============================================================
// Layer 2 — Centralized Dataset Assembler
// ============================================================
// Pools every client of each partition into a single dataset
// and preprocesses it once:
//
//   train partition ──pool──► one dataset ──train fn──► BatchStream
//   test partition  ──pool──► one dataset ──test fn───► BatchStream
//
// Epochs are fixed at one pass; callers loop over the stream
// themselves. Pooled order follows client ids lexicographically
// before the shuffle window is applied.

use anyhow::Result;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::{create_preprocess_fn, PreprocessConfig};
use crate::data::stream::BatchStream;
use crate::domain::task::EmnistTask;
use crate::domain::traits::ClientDataSource;

// ─── Centralized Configuration ───────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralizedConfig {
    pub train_batch_size:          usize,
    pub test_batch_size:           usize,
    pub train_shuffle_buffer_size: i64,
    pub test_shuffle_buffer_size:  i64,
    pub only_digits:               bool,
    pub task:                      EmnistTask,
    pub shuffle_seed:              Option<u64>,
}

impl Default for CentralizedConfig {
    fn default() -> Self {
        Self {
            train_batch_size:          20,
            test_batch_size:           500,
            train_shuffle_buffer_size: 10_000,
            test_shuffle_buffer_size:  1,
            only_digits:               false,
            task:                      EmnistTask::DigitRecognition,
            shuffle_seed:              None,
        }
    }
}

/// Load EMNIST and pool each partition into one preprocessed stream.
///
/// # Errors
/// `InvalidBatchSize` for a zero batch size, and any error from the
/// source or from pooling.
pub fn get_centralized_datasets<B: Backend>(
    source: &dyn ClientDataSource,
    config: &CentralizedConfig,
    device: &B::Device,
) -> Result<(BatchStream<B>, BatchStream<B>)> {
    let train_preprocess = create_preprocess_fn::<B>(
        &PreprocessConfig::new(1, config.train_batch_size)
            .with_shuffle_buffer_size(config.train_shuffle_buffer_size)
            .with_task(config.task)
            .with_seed(config.shuffle_seed),
        device,
    )?;
    let test_preprocess = create_preprocess_fn::<B>(
        &PreprocessConfig::new(1, config.test_batch_size)
            .with_shuffle_buffer_size(config.test_shuffle_buffer_size)
            .with_task(config.task)
            .with_seed(config.shuffle_seed),
        device,
    )?;

    let (train, test) = source.load_data(config.only_digits)?;
    let train = train_preprocess.apply(train.create_dataset_from_all_clients()?);
    let test = test_preprocess.apply(test.create_dataset_from_all_clients()?);

    tracing::info!(
        "Centralized EMNIST (only_digits={}, task={}): {} train records, {} test records",
        config.only_digits,
        config.task,
        train.num_records(),
        test.num_records(),
    );

    Ok((train, test))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    use crate::application::fixtures::{self, TestBackend};
    use crate::data::batcher::EmnistBatch;
    use crate::domain::error::PipelineError;

    fn load(config: &CentralizedConfig) -> Result<(BatchStream<TestBackend>, BatchStream<TestBackend>)> {
        get_centralized_datasets::<TestBackend>(&fixtures::source(4, 3, 2), config, &Default::default())
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let config = CentralizedConfig::default();
        assert_eq!(config.train_batch_size, 20);
        assert_eq!(config.test_batch_size, 500);
        assert_eq!(config.train_shuffle_buffer_size, 10_000);
        assert_eq!(config.test_shuffle_buffer_size, 1);
    }

    #[test]
    fn test_every_record_appears_exactly_once() {
        let (train, test) = load(&CentralizedConfig { train_batch_size: 5, ..Default::default() }).unwrap();

        assert_eq!(train.num_records(), 12);
        let train_labels: Vec<i64> = train.iter().flat_map(fixtures::labels).collect();
        assert_eq!(train_labels, vec![1; 12]);

        assert_eq!(test.num_records(), 8);
        let test_sizes: Vec<usize> = test.iter().map(|b| b.len()).collect();
        assert_eq!(test_sizes, vec![8]);
    }

    #[test]
    fn test_batch_sizes_and_single_pass() {
        let config = CentralizedConfig { train_batch_size: 5, test_batch_size: 3, ..Default::default() };
        let (train, test) = load(&config).unwrap();

        let train_sizes: Vec<usize> = train.iter().map(|b| b.len()).collect();
        assert_eq!(train_sizes, vec![5, 5, 2]);
        let test_sizes: Vec<usize> = test.iter().map(|b| b.len()).collect();
        assert_eq!(test_sizes, vec![3, 3, 2]);
        assert_eq!(train.num_batches(), Some(3));
    }

    #[test]
    fn test_unshuffled_test_stream_follows_client_order() {
        let config = CentralizedConfig { test_batch_size: 1, ..Default::default() };
        let (_, test) = load(&config).unwrap();

        // Each client's first pixel counts 0, 1 within the client.
        let firsts: Vec<f32> = test
            .iter()
            .map(|batch| match batch {
                EmnistBatch::DigitRecognition { input, .. } => {
                    input.into_data().convert::<f32>().to_vec::<f32>().unwrap()[0]
                }
                other => panic!("unexpected task {:?}", other.task()),
            })
            .collect();
        assert_eq!(firsts, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_autoencoder_task() {
        let config = CentralizedConfig { task: EmnistTask::Autoencoder, ..Default::default() };
        let (train, _) = load(&config).unwrap();
        let batch = train.iter().next().unwrap();
        assert_eq!(batch.task(), EmnistTask::Autoencoder);
        assert_eq!(batch.len(), 12);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = load(&CentralizedConfig { test_batch_size: 0, ..Default::default() }).err().unwrap();
        assert_eq!(err.downcast_ref::<PipelineError>(), Some(&PipelineError::InvalidBatchSize));
    }
}
