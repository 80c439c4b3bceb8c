// ============================================================
// Layer 3 — EMNIST Record Domain Type
// ============================================================
// One handwritten character written by one client (writer).
// A record is a small integer label plus a 2-D grid of pixel
// intensities. Real EMNIST grids are 28x28 with values in [0, 1].
//
// Records are read-only once loaded: every pipeline stage
// clones what it needs and never writes back.
//
// Reference: Cohen et al. (2017) EMNIST
//            Caldas et al. (2018) LEAF, the writer-partitioned split

use serde::{Deserialize, Serialize};

/// Side length of a real EMNIST pixel grid.
pub const IMAGE_SIZE: usize = 28;

/// Largest number of records held by a single client.
/// Used as the default shuffle buffer so per-client shuffles are full shuffles.
pub const MAX_CLIENT_DATASET_SIZE: i64 = 418;

/// Label universe of the digits-only split (EMNIST-10).
pub const NUM_DIGIT_CLASSES: usize = 10;

/// Label universe of the digits + letters split (EMNIST-62).
pub const NUM_ALL_CLASSES: usize = 62;

/// Number of label classes for the selected client universe.
pub fn num_classes(only_digits: bool) -> usize {
    if only_digits {
        NUM_DIGIT_CLASSES
    } else {
        NUM_ALL_CLASSES
    }
}

/// A single raw (label, pixels) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmnistItem {
    /// Character class: 0..10 for digits, 0..62 for the full set
    pub label: i32,

    /// Row-major pixel grid, `pixels[row][col]`
    pub pixels: Vec<Vec<f32>>,
}

impl EmnistItem {
    pub fn new(label: i32, pixels: Vec<Vec<f32>>) -> Self {
        Self { label, pixels }
    }

    /// Grid dimensions as (height, width).
    /// An empty grid reports (0, 0).
    pub fn shape(&self) -> (usize, usize) {
        let height = self.pixels.len();
        let width = self.pixels.first().map(Vec::len).unwrap_or(0);
        (height, width)
    }

    /// True when every row has the same non-zero width.
    pub fn is_rectangular(&self) -> bool {
        let (height, width) = self.shape();
        height > 0 && width > 0 && self.pixels.iter().all(|row| row.len() == width)
    }

    /// Pixels in row-major order.
    pub fn flat_pixels(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels.iter().flat_map(|row| row.iter().copied())
    }
}
