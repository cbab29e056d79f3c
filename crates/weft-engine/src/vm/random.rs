//! Deterministic per-object random streams
//!
//! The first draw of a logical tick reseeds the stream with
//! `sha256("{id}:{tick}")`; later draws in the same tick advance it with
//! `state = sha256(state)`. Identical identifiers and ticks therefore
//! reproduce identical sequences across runs.

use super::ids::FreshId;
use sha2::{Digest, Sha256};

/// Random stream state of one object
#[derive(Debug, Clone, Default)]
pub struct ObjectRng {
    tick: Option<u64>,
    state: [u8; 32],
}

impl ObjectRng {
    /// Fresh, unseeded stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Next number in `[0, 1)` for the object `id` at logical time `tick`
    pub fn next_f64(&mut self, id: &FreshId, tick: u64) -> f64 {
        let digest = if self.tick == Some(tick) {
            Sha256::digest(self.state)
        } else {
            self.tick = Some(tick);
            Sha256::digest(format!("{}:{}", id, tick).as_bytes())
        };
        self.state.copy_from_slice(&digest);
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.state[..8]);
        (u64::from_be_bytes(word) >> 11) as f64 / (1u64 << 53) as f64
    }
}
