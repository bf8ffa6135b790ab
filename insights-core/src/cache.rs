//! Answer cache
//!
//! A small bounded cache for repeated identical questions. Keys are the
//! sha256 of `(operation, catalog version, normalized inputs)`, so a
//! catalog reload invalidates everything and differently-phrased inputs
//! never collide. The engine additionally guards every hit: a cached
//! answer is only served after the time range is re-resolved for the same
//! phrase and reference instant and found equal to the cached plan's
//! range.

use crate::types::Answer;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Default number of cached answers before eviction.
pub const DEFAULT_CAPACITY: usize = 128;

/// Bounded FIFO cache of answers, keyed by request fingerprint.
#[derive(Debug)]
pub struct AnswerCache {
    entries: HashMap<String, Answer>,
    order: VecDeque<String>,
    capacity: usize,
}

impl AnswerCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Fingerprint for a request: operation + catalog version + inputs.
    pub fn key(operation: &str, catalog_version: &str, inputs: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update([0]);
        hasher.update(catalog_version.as_bytes());
        for input in inputs {
            hasher.update([0]);
            hasher.update(input.trim().to_lowercase().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<&Answer> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, answer: Answer) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, answer);
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, answer);
    }

    /// Drop an entry whose guard check failed.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
