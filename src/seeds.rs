//! Seed management for cave generation
//!
//! Every generation attempt gets its own seed derived from the root seed, so
//! attempts are independent of each other yet reproducible from
//! `(root, attempt)` alone.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive the seed for one generation attempt.
pub fn attempt_seed(root: u64, attempt: usize) -> u64 {
    derive_seed(root, "cave_attempt", attempt as u64)
}

/// Fresh RNG for one generation attempt.
pub fn attempt_rng(root: u64, attempt: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(attempt_seed(root, attempt))
}

/// Hash a root seed together with a system name and an index.
/// `DefaultHasher::new()` uses fixed keys, so the result is stable per build.
fn derive_seed(root: u64, system: &str, index: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    root.hash(&mut hasher);
    system.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}
