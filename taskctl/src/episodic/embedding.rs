//! Deterministic fallback embedding, standing in when no real embedder
//! is configured.
//!
//! When no real embedder is configured, text still needs to land
//! somewhere in [`crate::collab::VectorStore`]'s vector space so episodic
//! search keeps working end to end in tests and in deployments that
//! haven't wired one up yet. This hash-derived projection is
//! deterministic and side-effect-free: the same text always yields the
//! same vector, and nothing here reaches out to a network or clock.

use sha2::{Digest, Sha256};

pub const FALLBACK_EMBEDDING_DIM: usize = 32;

/// Hash `text` with SHA-256, then walk the digest in 4-byte windows
/// (wrapping around as needed to fill [`FALLBACK_EMBEDDING_DIM`]),
/// turning each window into a float in `[-1.0, 1.0]`. Not semantically
/// meaningful - two unrelated strings with the same length and a few
/// shared substrings will not score as "similar" under this embedding
/// the way they would under a real one - but stable and collision-
/// resistant enough to exercise [`crate::collab::VectorStore`]'s
/// nearest-neighbor contract.
pub fn fallback_embedding(text: &str) -> Vec<f32> {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    (0..FALLBACK_EMBEDDING_DIM)
        .map(|i| {
            let offset = (i * 4) % digest.len();
            let bytes = [
                digest[offset],
                digest[(offset + 1) % digest.len()],
                digest[(offset + 2) % digest.len()],
                digest[(offset + 3) % digest.len()],
            ];
            let word = u32::from_le_bytes(bytes);
            (word as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}
