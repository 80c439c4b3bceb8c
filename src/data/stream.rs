// ============================================================
// Layer 4 — Lazy Batch Streams
// ============================================================
// A BatchStream is a recipe, not a buffer. Nothing is read
// until someone iterates, and every call to `iter()` starts a
// brand new pass over the source, with a fresh shuffle unless a
// seed pins it.
//
// The stages always run in this order:
//
//   source records
//       │
//       ▼
//   ShuffleBuffer   → draws uniformly from a window of `shuffle_buffer`
//       │             records (window of 1 = original order)
//       ▼
//   RepeatedPasses  → re-runs the shuffled pass `epochs` times,
//       │             each pass reshuffled
//       ▼
//   Batched         → groups `batch_size` records; the last group may
//       │             be short; groups may straddle pass boundaries
//       ▼
//   take            → stops after `max_batches` groups
//       │
//       ▼
//   EmnistBatcher   → task mapping, one group at a time
//
// Memory held by a live iterator is the shuffle window plus one batch.
//
// Reference: Rust Book §13 (Iterators)
//            rand crate documentation

use rand::{rngs::StdRng, Rng, SeedableRng};

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;

use crate::data::batcher::{EmnistBatch, EmnistBatcher};
use crate::domain::record::EmnistItem;
use crate::domain::task::EmnistTask;
use crate::domain::traits::ClientDataset;

// ─── PipelinePlan ─────────────────────────────────────────────────────────────
/// How many times the shuffled source is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Times(usize),
    /// Replay until the consumer (or a batch cap) stops pulling
    Forever,
}

impl Repeat {
    /// Whether pass number `started + 1` may begin.
    fn allows(&self, started: usize) -> bool {
        match self {
            Repeat::Times(n) => started < *n,
            Repeat::Forever  => true,
        }
    }
}

/// The validated, normalized knobs of one pipeline.
/// Built by `create_preprocess_fn`; every field is already in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePlan {
    shuffle_buffer: usize,
    repeat:         Repeat,
    batch_size:     usize,
    max_batches:    Option<usize>,
    seed:           Option<u64>,
}

impl PipelinePlan {
    pub(crate) fn new(
        shuffle_buffer: usize,
        repeat:         Repeat,
        batch_size:     usize,
        max_batches:    Option<usize>,
        seed:           Option<u64>,
    ) -> Self {
        Self {
            shuffle_buffer: shuffle_buffer.max(1),
            repeat,
            batch_size: batch_size.max(1),
            max_batches,
            seed,
        }
    }

    pub fn shuffle_buffer(&self) -> usize { self.shuffle_buffer }
    pub fn repeat(&self) -> Repeat { self.repeat }
    pub fn batch_size(&self) -> usize { self.batch_size }
    pub fn max_batches(&self) -> Option<usize> { self.max_batches }
    pub fn seed(&self) -> Option<u64> { self.seed }

    /// Batches a stream over `num_records` records will yield,
    /// or None when the stream never ends.
    pub fn num_batches(&self, num_records: usize) -> Option<usize> {
        let uncapped = match self.repeat {
            _ if num_records == 0 => Some(0),
            Repeat::Times(epochs) => Some(num_records.saturating_mul(epochs).div_ceil(self.batch_size)),
            Repeat::Forever       => None,
        };
        match (uncapped, self.max_batches) {
            (Some(n), Some(cap)) => Some(n.min(cap)),
            (Some(n), None)      => Some(n),
            (None, cap)          => cap,
        }
    }
}

// ─── RecordCursor ─────────────────────────────────────────────────────────────
/// Owned, front-to-back walk over a dataset.
struct RecordCursor {
    dataset: ClientDataset,
    index:   usize,
}

impl RecordCursor {
    fn new(dataset: ClientDataset) -> Self {
        Self { dataset, index: 0 }
    }
}

impl Iterator for RecordCursor {
    type Item = EmnistItem;

    fn next(&mut self) -> Option<EmnistItem> {
        while self.index < self.dataset.len() {
            let index = self.index;
            self.index += 1;
            if let Some(item) = self.dataset.get(index) {
                return Some(item);
            }
        }
        None
    }
}

// ─── ShuffleBuffer ────────────────────────────────────────────────────────────
/// Windowed shuffle: keep up to `capacity` upstream items and emit a
/// uniformly chosen one each step, refilling from upstream.
///
/// A window at least as large as the upstream is a full uniform shuffle;
/// a window of 1 passes items through unchanged.
pub struct ShuffleBuffer<I: Iterator> {
    upstream: I,
    buffer:   Vec<I::Item>,
    capacity: usize,
    rng:      StdRng,
}

impl<I: Iterator> ShuffleBuffer<I> {
    pub fn new(upstream: I, capacity: usize, rng: StdRng) -> Self {
        let capacity = capacity.max(1);
        Self {
            upstream,
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            rng,
        }
    }
}

impl<I: Iterator> Iterator for ShuffleBuffer<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        while self.buffer.len() < self.capacity {
            match self.upstream.next() {
                Some(item) => self.buffer.push(item),
                None => break,
            }
        }
        if self.buffer.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(pick))
    }
}

// ─── RepeatedPasses ───────────────────────────────────────────────────────────
/// Chains shuffled passes over the source.
///
/// Each pass gets its own shuffle seeded from the parent rng, so a seeded
/// stream is reproducible while successive passes still differ.
/// A pass that yields nothing ends the stream, even under `Repeat::Forever`.
struct RepeatedPasses {
    source:         ClientDataset,
    shuffle_buffer: usize,
    repeat:         Repeat,
    rng:            StdRng,
    current:        Option<ShuffleBuffer<RecordCursor>>,
    passes_started: usize,
    pass_yielded:   usize,
    exhausted:      bool,
}

impl RepeatedPasses {
    fn new(source: ClientDataset, plan: &PipelinePlan, rng: StdRng) -> Self {
        Self {
            source,
            shuffle_buffer: plan.shuffle_buffer,
            repeat: plan.repeat,
            rng,
            current: None,
            passes_started: 0,
            pass_yielded: 0,
            exhausted: false,
        }
    }

    fn start_pass(&mut self) {
        let pass_rng = StdRng::seed_from_u64(self.rng.gen());
        self.current = Some(ShuffleBuffer::new(
            RecordCursor::new(self.source.clone()),
            self.shuffle_buffer,
            pass_rng,
        ));
        self.passes_started += 1;
        self.pass_yielded = 0;
    }
}

impl Iterator for RepeatedPasses {
    type Item = EmnistItem;

    fn next(&mut self) -> Option<EmnistItem> {
        loop {
            if self.exhausted {
                return None;
            }

            if let Some(pass) = self.current.as_mut() {
                if let Some(item) = pass.next() {
                    self.pass_yielded += 1;
                    return Some(item);
                }
                self.current = None;
                if self.pass_yielded == 0 {
                    self.exhausted = true;
                    continue;
                }
            }

            if !self.repeat.allows(self.passes_started) {
                self.exhausted = true;
                continue;
            }
            self.start_pass();
        }
    }
}

// ─── Batched ──────────────────────────────────────────────────────────────────
/// Groups consecutive items; the final group may be short, never dropped.
pub struct Batched<I: Iterator> {
    inner: I,
    size:  usize,
}

impl<I: Iterator> Batched<I> {
    pub fn new(inner: I, size: usize) -> Self {
        Self { inner, size: size.max(1) }
    }
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Vec<I::Item>> {
        let group: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// A restartable, lazily evaluated stream of preprocessed batches.
#[derive(Clone)]
pub struct BatchStream<B: Backend> {
    source:  ClientDataset,
    plan:    PipelinePlan,
    batcher: EmnistBatcher<B>,
}

impl<B: Backend> BatchStream<B> {
    pub(crate) fn new(source: ClientDataset, plan: PipelinePlan, batcher: EmnistBatcher<B>) -> Self {
        Self { source, plan, batcher }
    }

    /// Start a fresh pass over the pipeline.
    pub fn iter(&self) -> BatchIter<B> {
        let rng = match self.plan.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let records = RepeatedPasses::new(self.source.clone(), &self.plan, rng);
        let cap = self.plan.max_batches.unwrap_or(usize::MAX);

        BatchIter {
            groups:  Batched::new(records, self.plan.batch_size).take(cap),
            batcher: self.batcher.clone(),
        }
    }

    /// Records in one unrepeated pass of the source.
    pub fn num_records(&self) -> usize {
        self.source.len()
    }

    /// Batches one full iteration yields; None if it never ends.
    pub fn num_batches(&self) -> Option<usize> {
        self.plan.num_batches(self.source.len())
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    pub fn task(&self) -> EmnistTask {
        self.batcher.task()
    }
}

impl<'a, B: Backend> IntoIterator for &'a BatchStream<B> {
    type Item = EmnistBatch<B>;
    type IntoIter = BatchIter<B>;

    fn into_iter(self) -> BatchIter<B> {
        self.iter()
    }
}

/// Iterator handed out by [`BatchStream::iter`].
pub struct BatchIter<B: Backend> {
    groups:  std::iter::Take<Batched<RepeatedPasses>>,
    batcher: EmnistBatcher<B>,
}

impl<B: Backend> Iterator for BatchIter<B> {
    type Item = EmnistBatch<B>;

    fn next(&mut self) -> Option<EmnistBatch<B>> {
        self.groups.next().map(|items| self.batcher.batch(items))
    }
}
