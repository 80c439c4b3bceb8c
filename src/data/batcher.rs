// ============================================================
// Layer 4 — EMNIST Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec of raw records in,
// one (input, target) tensor pair out. This is the last stage
// of every pipeline and the only place tensors are created.
//
// All records are first stacked into one [n, h, w] grid tensor,
// then the task decides the final shape:
//
//   DigitRecognition:
//     input  [n, h, w]  → unsqueeze → [n, h, w, 1]
//     target labels                 → [n]            (Int)
//
//   Autoencoder:
//     input  [n, h, w]  → reshape   → [n, h*w]
//                       → 1 - x     (ink becomes 0, paper becomes 1)
//     target = input
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::domain::record::EmnistItem;
use crate::domain::task::EmnistTask;

// ─── EmnistBatch ──────────────────────────────────────────────────────────────
/// One preprocessed batch. The variant matches the task that produced it.
#[derive(Debug, Clone)]
pub enum EmnistBatch<B: Backend> {
    DigitRecognition {
        /// Pixel grids with a trailing channel dim — shape: [n, h, w, 1]
        input: Tensor<B, 4>,
        /// Class labels — shape: [n]
        target: Tensor<B, 1, Int>,
    },
    Autoencoder {
        /// Flattened, inverted pixels — shape: [n, h*w]
        input: Tensor<B, 2>,
        /// Same values as `input`
        target: Tensor<B, 2>,
    },
}

impl<B: Backend> EmnistBatch<B> {
    /// Number of records in this batch.
    pub fn len(&self) -> usize {
        match self {
            EmnistBatch::DigitRecognition { target, .. } => target.dims()[0],
            EmnistBatch::Autoencoder { input, .. } => input.dims()[0],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task(&self) -> EmnistTask {
        match self {
            EmnistBatch::DigitRecognition { .. } => EmnistTask::DigitRecognition,
            EmnistBatch::Autoencoder { .. } => EmnistTask::Autoencoder,
        }
    }
}

// ─── EmnistBatcher ────────────────────────────────────────────────────────────
/// Holds the target device and the task mapping to apply.
#[derive(Clone, Debug)]
pub struct EmnistBatcher<B: Backend> {
    device: B::Device,
    task:   EmnistTask,
}

impl<B: Backend> EmnistBatcher<B> {
    pub fn new(task: EmnistTask, device: B::Device) -> Self {
        Self { device, task }
    }

    pub fn task(&self) -> EmnistTask {
        self.task
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Stack every record's grid into one [n, h, w] tensor.
    fn stack_pixels(&self, items: &[EmnistItem]) -> Tensor<B, 3> {
        let (height, width) = items[0].shape();
        assert!(
            items.iter().all(|item| item.is_rectangular() && item.shape() == (height, width)),
            "all records in a batch must share one {height}x{width} pixel grid"
        );

        let flat: Vec<f32> = items.iter().flat_map(|item| item.flat_pixels()).collect();

        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([items.len(), height, width])
    }
}

impl<B: Backend> Batcher<EmnistItem, EmnistBatch<B>> for EmnistBatcher<B> {
    /// # Panics
    /// Panics if `items` is empty or the records do not share a grid shape.
    /// Batches handed over by a `BatchStream` always satisfy both.
    fn batch(&self, items: Vec<EmnistItem>) -> EmnistBatch<B> {
        assert!(!items.is_empty(), "cannot batch zero records");
        let pixels = self.stack_pixels(&items);

        match self.task {
            EmnistTask::DigitRecognition => {
                let labels: Vec<i32> = items.iter().map(|item| item.label).collect();
                EmnistBatch::DigitRecognition {
                    input:  pixels.unsqueeze_dim::<4>(3),
                    target: Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device),
                }
            }
            EmnistTask::Autoencoder => {
                let [n, height, width] = pixels.dims();
                let inverted = pixels
                    .reshape([n, height * width])
                    .neg()
                    .add_scalar(1.0);
                EmnistBatch::Autoencoder {
                    input:  inverted.clone(),
                    target: inverted,
                }
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn floats<const D: usize>(tensor: Tensor<TestBackend, D>) -> Vec<f32> {
        tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn ints(tensor: Tensor<TestBackend, 1, Int>) -> Vec<i64> {
        tensor.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_digit_batch_adds_channel_dim() {
        let batcher = EmnistBatcher::<TestBackend>::new(EmnistTask::DigitRecognition, Default::default());
        let batch = batcher.batch(vec![EmnistItem::new(3, vec![vec![0.0, 0.0], vec![0.0, 0.0]])]);

        match batch {
            EmnistBatch::DigitRecognition { input, target } => {
                assert_eq!(input.dims(), [1, 2, 2, 1]);
                assert_eq!(floats(input), vec![0.0; 4]);
                assert_eq!(ints(target), vec![3]);
            }
            other => panic!("expected a digit batch, got {:?}", other.task()),
        }
    }

    #[test]
    fn test_autoencoder_batch_flattens_and_inverts() {
        let batcher = EmnistBatcher::<TestBackend>::new(EmnistTask::Autoencoder, Default::default());
        let batch = batcher.batch(vec![
            EmnistItem::new(0, vec![vec![0.0, 1.0], vec![1.0, 0.0]]),
            EmnistItem::new(9, vec![vec![0.25, 0.5], vec![0.75, 1.0]]),
        ]);
        assert_eq!(batch.len(), 2);

        match batch {
            EmnistBatch::Autoencoder { input, target } => {
                assert_eq!(input.dims(), [2, 4]);
                assert_eq!(floats(input.clone()), floats(target));
                assert_eq!(floats(input), vec![1.0, 0.0, 0.0, 1.0, 0.75, 0.5, 0.25, 0.0]);
            }
            other => panic!("expected an autoencoder batch, got {:?}", other.task()),
        }
    }

    #[test]
    fn test_digit_batch_keeps_record_order() {
        let batcher = EmnistBatcher::<TestBackend>::new(EmnistTask::DigitRecognition, Default::default());
        let items: Vec<EmnistItem> = (0..5)
            .map(|label| EmnistItem::new(label, vec![vec![label as f32]]))
            .collect();
        match batcher.batch(items) {
            EmnistBatch::DigitRecognition { input, target } => {
                assert_eq!(input.dims(), [5, 1, 1, 1]);
                assert_eq!(floats(input), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
                assert_eq!(ints(target), vec![0, 1, 2, 3, 4]);
            }
            other => panic!("expected a digit batch, got {:?}", other.task()),
        }
    }

    #[test]
    #[should_panic(expected = "pixel grid")]
    fn test_mixed_grid_shapes_panic() {
        let batcher = EmnistBatcher::<TestBackend>::new(EmnistTask::Autoencoder, Default::default());
        batcher.batch(vec![
            EmnistItem::new(0, vec![vec![0.0, 1.0]]),
            EmnistItem::new(1, vec![vec![0.0], vec![1.0]]),
        ]);
    }
}
