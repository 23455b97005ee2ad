use crate::{hash_fields, payload_bytes, pow, Block};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Searches nonces in parallel until one yields a hash with `difficulty`
/// leading `'0'` characters, returning the winning nonce and hash without
/// touching the block. Raising `cancel` makes every worker stand down;
/// a cancelled search returns `None`.
///
/// The hash predicate is the same textual prefix check the sequential
/// [`Block::mine`] loop uses, so the two miners are interchangeable.
pub fn search_nonce(block: &Block, difficulty: usize, cancel: &AtomicBool) -> Option<(u64, String)> {
    // The payload encoding is the expensive part of each attempt; do it once.
    let payload = payload_bytes(&block.payload);
    let candidate = |nonce: u64| {
        hash_fields(
            block.index,
            block.timestamp,
            &payload,
            &block.previous_hash,
            nonce,
        )
    };

    // A raised cancel flag satisfies the predicate too, so `find_any` returns
    // promptly with a nonce that then fails the verification below.
    let nonce = (0u64..u64::MAX).into_par_iter().find_any(|&nonce| {
        cancel.load(Ordering::Relaxed) || pow::meets_difficulty(&candidate(nonce), difficulty)
    })?;

    let hash = candidate(nonce);
    if pow::meets_difficulty(&hash, difficulty) {
        debug!(index = block.index, nonce, %hash, "parallel nonce search succeeded");
        Some((nonce, hash))
    } else {
        None
    }
}
