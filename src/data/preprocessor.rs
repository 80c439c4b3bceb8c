// ============================================================
// Layer 4 — Preprocessing-Function Builder
// ============================================================
// Turns a handful of knobs into a reusable PreprocessFn that
// maps a raw record dataset to a lazy BatchStream.
//
// Knobs and how they are normalized:
//
//   num_epochs           > 0  → repeat that many times
//                        <= 0 → repeat forever, when max_batches >= 0
//                        == 0 → no passes at all, when max_batches < 0
//   max_batches          >= 0 → take at most that many batches
//                        < 0  → no cap
//   shuffle_buffer_size  <= 1 → window of 1, i.e. no shuffling
//   batch_size           == 0 → rejected
//   task                        closed enum, unknown names fail to parse
//
// num_epochs < 0 together with max_batches < 0 is rejected:
// nothing would ever end the stream.
//
// Validation happens here, once, before any record is read.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §13 (Closures)

use serde::{Deserialize, Serialize};

use burn::tensor::backend::Backend;

use crate::data::batcher::EmnistBatcher;
use crate::data::stream::{BatchStream, PipelinePlan, Repeat};
use crate::domain::error::PipelineError;
use crate::domain::record::MAX_CLIENT_DATASET_SIZE;
use crate::domain::task::EmnistTask;
use crate::domain::traits::ClientDataset;

// ─── PreprocessConfig ────────────────────────────────────────────────────────
/// Raw pipeline knobs, in the signed form callers and config files use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub num_epochs:          i64,
    pub batch_size:          usize,
    /// -1 = unbounded
    pub max_batches:         i64,
    pub shuffle_buffer_size: i64,
    pub task:                EmnistTask,
    /// Pins every shuffle draw; None draws a fresh shuffle per iteration
    pub seed:                Option<u64>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            num_epochs:          1,
            batch_size:          20,
            max_batches:         -1,
            shuffle_buffer_size: MAX_CLIENT_DATASET_SIZE,
            task:                EmnistTask::DigitRecognition,
            seed:                None,
        }
    }
}

impl PreprocessConfig {
    pub fn new(num_epochs: i64, batch_size: usize) -> Self {
        Self { num_epochs, batch_size, ..Self::default() }
    }

    pub fn with_max_batches(mut self, max_batches: i64) -> Self {
        self.max_batches = max_batches;
        self
    }

    pub fn with_shuffle_buffer_size(mut self, size: i64) -> Self {
        self.shuffle_buffer_size = size;
        self
    }

    pub fn with_task(mut self, task: EmnistTask) -> Self {
        self.task = task;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Check the knobs and fold them into a PipelinePlan.
    pub fn plan(&self) -> Result<PipelinePlan, PipelineError> {
        if self.num_epochs < 0 && self.max_batches < 0 {
            return Err(PipelineError::UnboundedStream {
                num_epochs:  self.num_epochs,
                max_batches: self.max_batches,
            });
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidBatchSize);
        }

        let max_batches = usize::try_from(self.max_batches).ok();
        let repeat = match (self.num_epochs, max_batches) {
            (epochs, _) if epochs > 0 => Repeat::Times(usize::try_from(epochs).unwrap_or(usize::MAX)),
            // Only a cap may stand in for the epoch count.
            (_, Some(_)) => Repeat::Forever,
            (_, None)    => Repeat::Times(0),
        };

        Ok(PipelinePlan::new(
            normalize_shuffle_buffer(self.shuffle_buffer_size),
            repeat,
            self.batch_size,
            max_batches,
            self.seed,
        ))
    }
}

/// Any window of 1 or less means "keep the original order".
pub fn normalize_shuffle_buffer(size: i64) -> usize {
    if size <= 1 {
        1
    } else {
        usize::try_from(size).unwrap_or(usize::MAX)
    }
}

// ─── PreprocessFn ─────────────────────────────────────────────────────────────
/// A validated pipeline, ready to be applied to any record dataset.
///
/// Cheap to clone and free of shared mutable state: applying it twice
/// gives two independent streams.
#[derive(Clone, Debug)]
pub struct PreprocessFn<B: Backend> {
    plan:    PipelinePlan,
    batcher: EmnistBatcher<B>,
}

impl<B: Backend> PreprocessFn<B> {
    /// Compose the pipeline over `records`. Nothing is read yet.
    pub fn apply(&self, records: ClientDataset) -> BatchStream<B> {
        BatchStream::new(records, self.plan, self.batcher.clone())
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    pub fn task(&self) -> EmnistTask {
        self.batcher.task()
    }
}

/// Build a PreprocessFn whose batches are created on `device`.
///
/// # Errors
/// `UnboundedStream` if neither epochs nor a cap bound the stream,
/// `InvalidBatchSize` if `batch_size` is zero.
pub fn create_preprocess_fn<B: Backend>(
    config: &PreprocessConfig,
    device: &B::Device,
) -> Result<PreprocessFn<B>, PipelineError> {
    let plan = config.plan()?;

    tracing::debug!(
        "Preprocess fn: task={}, epochs={:?}, batch_size={}, max_batches={:?}, shuffle_buffer={}",
        config.task,
        plan.repeat(),
        plan.batch_size(),
        plan.max_batches(),
        plan.shuffle_buffer(),
    );

    Ok(PreprocessFn {
        plan,
        batcher: EmnistBatcher::new(config.task, device.clone()),
    })
}
