// ============================================================
// Layer 4 — Personalization Client Splitter
// ============================================================
// Partitions client ids (not records) into two groups:
//   - Training clients: used to learn the shared model
//   - Test clients:     held out to measure personalization
//
// The split is a seeded permutation followed by a cut:
//
//   sorted ids ──shuffle(seed)──► [ first N | remainder ]
//                                    train     test
//
// Ids are sorted before shuffling so the result depends on the
// *set* of ids and the seed, never on the order a store happened
// to list them in.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation
//            Rust Book §8 (Vectors)

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Default number of clients in the personalization training set.
pub const NUM_CLIENTS_P13N_TRAIN: usize = 2500;

/// Shuffle `client_ids` and split off the first `num_train` as training clients.
///
/// # Arguments
/// * `client_ids` - All client ids (consumed by this function)
/// * `num_train`  - Size of the training group, clamped to the id count
/// * `seed`       - Fixes the permutation; None draws from OS entropy
///
/// # Returns
/// A tuple (train_ids, test_ids)
pub fn split_clients(
    mut client_ids: Vec<String>,
    num_train: usize,
    seed: Option<u64>,
) -> (Vec<String>, Vec<String>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };

    client_ids.sort();
    client_ids.shuffle(&mut rng);

    let split_at = num_train.min(client_ids.len());
    let test_ids = client_ids.split_off(split_at);

    tracing::debug!(
        "Client split: {} training, {} test (seed={:?})",
        client_ids.len(),
        test_ids.len(),
        seed,
    );

    (client_ids, test_ids)
}
