// ============================================================
// Layer 4 — In-Memory Client Collections
// ============================================================
// Concrete ClientData built from records already in memory.
//
//   InMemoryClientData → BTreeMap<client_id, InMemDataset>
//   InMemorySource     → paired partitions per label universe
//
// Client ids live in a BTreeMap so `client_ids()` and the pooled
// dataset are always in lexicographic order. Pooling the same
// load twice therefore yields the same record order.
//
// Every record of a partition shares one rectangular grid shape,
// and a registered (train, test) pair shares it too. Batches are
// stacked into one tensor, so a mixed shape is rejected here
// rather than when a stream is iterated.
//
// Reference: Burn Book §4 (InMemDataset)
//            Rust Book §8 (Collections)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use burn::data::dataset::{Dataset, InMemDataset};

use crate::domain::error::PipelineError;
use crate::domain::record::EmnistItem;
use crate::domain::traits::{ClientData, ClientDataSource, ClientDataset};

// ─── Grid Shapes ─────────────────────────────────────────────────────────────
/// Height and width shared by every record of a partition.
pub type GridShape = (usize, usize);

/// Check that every record has a rectangular grid of one shape.
/// Returns that shape, or None when there are no records.
pub fn validate_grid_shapes(
    records: &BTreeMap<String, Vec<EmnistItem>>,
) -> Result<Option<GridShape>, PipelineError> {
    let mut expected_shape: Option<GridShape> = None;

    for (client_id, items) in records {
        for (index, item) in items.iter().enumerate() {
            let invalid = |reason: String| PipelineError::InvalidRecord {
                client_id: client_id.clone(),
                reason:    format!("record {index}: {reason}"),
            };

            if !item.is_rectangular() {
                return Err(invalid("pixel grid is empty or ragged".to_string()));
            }

            let shape = item.shape();
            match expected_shape {
                None => expected_shape = Some(shape),
                Some(expected) if expected != shape => {
                    return Err(invalid(format!(
                        "pixel grid is {}x{}, expected {}x{}",
                        shape.0, shape.1, expected.0, expected.1
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(expected_shape)
}

/// Train and test must share one grid shape. An empty side agrees with any.
pub fn check_partitions_agree(
    train: &InMemoryClientData,
    test:  &InMemoryClientData,
) -> Result<(), PipelineError> {
    match (train.grid_shape, test.grid_shape) {
        (Some(expected), Some(shape)) if expected != shape => {
            Err(PipelineError::InvalidRecord {
                client_id: test.first_client_with_records().unwrap_or_default(),
                reason:    format!(
                    "test pixel grids are {}x{}, train grids are {}x{}",
                    shape.0, shape.1, expected.0, expected.1
                ),
            })
        }
        _ => Ok(()),
    }
}

// ─── InMemoryClientData ───────────────────────────────────────────────────────
/// A partition whose records are all held in memory.
#[derive(Clone, Default)]
pub struct InMemoryClientData {
    clients:    BTreeMap<String, ClientDataset>,
    grid_shape: Option<GridShape>,
}

impl InMemoryClientData {
    /// Wrap `records`, rejecting empty, ragged or mismatched grids.
    pub fn new(records: BTreeMap<String, Vec<EmnistItem>>) -> Result<Self, PipelineError> {
        let grid_shape = validate_grid_shapes(&records)?;
        let clients = records
            .into_iter()
            .map(|(id, items)| {
                let dataset: ClientDataset = Arc::new(InMemDataset::new(items));
                (id, dataset)
            })
            .collect();
        Ok(Self { clients, grid_shape })
    }

    /// Shape shared by every record; None for a partition with no records.
    pub fn grid_shape(&self) -> Option<GridShape> {
        self.grid_shape
    }

    fn first_client_with_records(&self) -> Option<String> {
        self.clients
            .iter()
            .find(|(_, dataset)| !dataset.is_empty())
            .map(|(id, _)| id.clone())
    }

    /// Number of clients in this partition.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Total number of records across all clients.
    pub fn num_records(&self) -> usize {
        self.clients.values().map(|d| d.len()).sum()
    }
}

impl ClientData for InMemoryClientData {
    fn client_ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    fn create_dataset(&self, client_id: &str) -> Result<ClientDataset> {
        self.clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownClient(client_id.to_string()).into())
    }
}

// ─── InMemorySource ───────────────────────────────────────────────────────────
/// A ClientDataSource backed by partitions registered up front.
#[derive(Clone, Default)]
pub struct InMemorySource {
    /// only_digits → (train, test)
    partitions: HashMap<bool, (Arc<InMemoryClientData>, Arc<InMemoryClientData>)>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the (train, test) pair returned for `only_digits`.
    ///
    /// # Errors
    /// `InvalidRecord` if the two partitions hold different grid shapes.
    pub fn with_partition(
        mut self,
        only_digits: bool,
        train: InMemoryClientData,
        test:  InMemoryClientData,
    ) -> Result<Self, PipelineError> {
        check_partitions_agree(&train, &test)?;
        self.partitions
            .insert(only_digits, (Arc::new(train), Arc::new(test)));
        Ok(self)
    }
}

impl ClientDataSource for InMemorySource {
    fn load_data(&self, only_digits: bool) -> Result<(Arc<dyn ClientData>, Arc<dyn ClientData>)> {
        let (train, test) = self.partitions.get(&only_digits).ok_or_else(|| {
            anyhow!("no in-memory partition registered for only_digits={only_digits}")
        })?;

        tracing::debug!(
            "In-memory load (only_digits={}): {} train clients, {} test clients",
            only_digits,
            train.num_clients(),
            test.num_clients(),
        );

        let train: Arc<dyn ClientData> = train.clone();
        let test: Arc<dyn ClientData> = test.clone();
        Ok((train, test))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::transform::ComposedDataset;

    fn item(label: i32) -> EmnistItem {
        EmnistItem::new(label, vec![vec![label as f32]])
    }

    fn labels(dataset: &ClientDataset) -> Vec<i32> {
        (0..dataset.len()).map(|i| dataset.get(i).unwrap().label).collect()
    }

    fn partition(clients: Vec<(&str, Vec<EmnistItem>)>) -> Result<InMemoryClientData, PipelineError> {
        InMemoryClientData::new(
            clients
                .into_iter()
                .map(|(id, items)| (id.to_string(), items))
                .collect(),
        )
    }

    fn sample_partition() -> InMemoryClientData {
        partition(vec![
            ("writer_b", vec![item(3), item(4)]),
            ("writer_a", vec![item(1), item(2)]),
            ("writer_c", vec![]),
            ("writer_d", vec![item(5)]),
        ])
        .unwrap()
    }

    fn square(label: i32, side: usize) -> EmnistItem {
        EmnistItem::new(label, vec![vec![0.5; side]; side])
    }

    #[test]
    fn test_client_ids_are_sorted() {
        let data = sample_partition();
        assert_eq!(data.client_ids(), vec!["writer_a", "writer_b", "writer_c", "writer_d"]);
        assert_eq!(data.num_clients(), 4);
        assert_eq!(data.num_records(), 5);
    }

    #[test]
    fn test_unknown_client_is_an_error() {
        let err = sample_partition().create_dataset("nobody").err().unwrap();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::UnknownClient("nobody".to_string()))
        );
    }

    #[test]
    fn test_pooled_dataset_follows_client_order() {
        let pooled = sample_partition().create_dataset_from_all_clients().unwrap();
        assert_eq!(pooled.len(), 5);
        assert_eq!(labels(&pooled), vec![1, 2, 3, 4, 5]);
        assert!(pooled.get(5).is_none());
    }

    #[test]
    fn test_concat_skips_empty_parts() {
        let empty: ClientDataset = Arc::new(InMemDataset::new(Vec::<EmnistItem>::new()));
        let one: ClientDataset = Arc::new(InMemDataset::new(vec![item(7)]));
        let two: ClientDataset = Arc::new(InMemDataset::new(vec![item(8), item(9)]));
        let concat: ClientDataset = Arc::new(ComposedDataset::new(vec![
            empty.clone(),
            one,
            empty.clone(),
            two,
            empty,
        ]));
        assert_eq!(labels(&concat), vec![7, 8, 9]);
    }

    #[test]
    fn test_source_returns_registered_partition() {
        let source = InMemorySource::new()
            .with_partition(true, sample_partition(), sample_partition())
            .unwrap();
        let (train, test) = source.load_data(true).unwrap();
        assert_eq!(train.client_ids(), test.client_ids());
        assert!(source.load_data(false).is_err());
    }

    #[test]
    fn test_grid_shape_is_recorded() {
        assert_eq!(sample_partition().grid_shape(), Some((1, 1)));
        assert_eq!(partition(vec![("a", vec![])]).unwrap().grid_shape(), None);
    }

    #[test]
    fn test_mixed_shapes_within_a_partition_are_rejected() {
        let err = partition(vec![("a", vec![square(1, 2)]), ("b", vec![square(2, 3)])])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::InvalidRecord { ref client_id, ref reason }
                if client_id == "b" && reason.contains("expected 2x2")
        ));
    }

    #[test]
    fn test_ragged_grid_is_rejected() {
        let ragged = EmnistItem::new(1, vec![vec![0.0, 0.0], vec![0.0]]);
        assert!(partition(vec![("a", vec![ragged])]).is_err());
    }

    #[test]
    fn test_partitions_with_different_shapes_are_rejected() {
        let train = partition(vec![("a", vec![square(1, 2)])]).unwrap();
        let test = partition(vec![("a", vec![]), ("b", vec![square(1, 3)])]).unwrap();

        let err = InMemorySource::new().with_partition(false, train, test).err().unwrap();
        assert!(matches!(
            err,
            PipelineError::InvalidRecord { ref client_id, ref reason }
                if client_id == "b" && reason.contains("3x3") && reason.contains("2x2")
        ));
    }

    #[test]
    fn test_empty_partition_agrees_with_any_shape() {
        let train = partition(vec![("a", vec![square(1, 2)])]).unwrap();
        let test = partition(vec![("a", vec![])]).unwrap();
        assert!(check_partitions_agree(&train, &test).is_ok());
    }
}
