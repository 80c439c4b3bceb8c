// ============================================================
// Layer 4 — Client Store Loader
// ============================================================
// Loads writer-partitioned EMNIST from JSON files on disk.
//
// Expected directory layout:
//
//   <dir>/
//     emnist_digitsonly_train.json   ← 10-class universe
//     emnist_digitsonly_test.json
//     emnist_all_train.json          ← 62-class universe
//     emnist_all_test.json
//
// Each file maps client id → that client's records:
//
//   {
//     "f0000_14": [ { "label": 3, "pixels": [[0.0, ...], ...] }, ... ],
//     ...
//   }
//
// Every record is validated on load: the label must belong to
// the selected universe and all grids, across both files of a
// universe, must be rectangular and share one shape. A bad
// record fails the whole load; nothing is silently skipped.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::{fs::File, io::BufReader, path::{Path, PathBuf}};

use crate::data::client_data::{check_partitions_agree, InMemoryClientData};
use crate::domain::error::PipelineError;
use crate::domain::record::{num_classes, EmnistItem};
use crate::domain::traits::{ClientData, ClientDataSource};

/// Which half of the client universe a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test  => "test",
        }
    }
}

/// File name holding one partition of one label universe.
pub fn partition_file_name(only_digits: bool, partition: Partition) -> String {
    let universe = if only_digits { "digitsonly" } else { "all" };
    format!("emnist_{}_{}.json", universe, partition.as_str())
}

/// Loads client partitions from a directory of JSON files.
/// Implements the ClientDataSource trait from Layer 3.
pub struct JsonClientSource {
    dir: PathBuf,
}

impl JsonClientSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and validate one partition file.
    pub fn load_partition(&self, only_digits: bool, partition: Partition) -> Result<InMemoryClientData> {
        let path = self.dir.join(partition_file_name(only_digits, partition));

        let file = File::open(&path)
            .with_context(|| format!("Cannot open client store '{}'", path.display()))?;

        let records: BTreeMap<String, Vec<EmnistItem>> =
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Cannot parse client store '{}'", path.display()))?;

        let data = validate_labels(&records, num_classes(only_digits))
            .and_then(|()| InMemoryClientData::new(records))
            .with_context(|| format!("Invalid record in '{}'", path.display()))?;
        tracing::info!(
            "Loaded {} {} clients ({} records) from '{}'",
            data.num_clients(),
            partition.as_str(),
            data.num_records(),
            path.display(),
        );
        Ok(data)
    }
}

impl ClientDataSource for JsonClientSource {
    fn load_data(&self, only_digits: bool) -> Result<(Arc<dyn ClientData>, Arc<dyn ClientData>)> {
        let train = self.load_partition(only_digits, Partition::Train)?;
        let test = self.load_partition(only_digits, Partition::Test)?;

        check_partitions_agree(&train, &test).with_context(|| {
            format!(
                "Invalid record in '{}'",
                self.dir.join(partition_file_name(only_digits, Partition::Test)).display()
            )
        })?;
        Ok((Arc::new(train), Arc::new(test)))
    }
}

/// Check every label against the universe's class count.
fn validate_labels(
    records: &BTreeMap<String, Vec<EmnistItem>>,
    num_classes: usize,
) -> Result<(), PipelineError> {
    for (client_id, items) in records {
        for (index, item) in items.iter().enumerate() {
            if item.label < 0 || item.label as usize >= num_classes {
                return Err(PipelineError::InvalidRecord {
                    client_id: client_id.clone(),
                    reason:    format!(
                        "record {index}: label {} outside 0..{}",
                        item.label, num_classes
                    ),
                });
            }
        }
    }
    Ok(())
}
