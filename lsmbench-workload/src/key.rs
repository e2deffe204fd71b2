//! Synthetic keys and per-epoch prefixes.
//!
//! Every key is 16 bytes: an 8-byte little-endian prefix followed by an 8-byte little-endian
//! sequence number. Byte-wise ordering of such keys does not follow their numeric order, which is
//! fine for a write workload.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Length of a synthesized key in bytes.
pub const KEY_LEN: usize = 16;

/// Number of low prefix bits holding the epoch in counter-based prefixes.
const EPOCH_BITS: u32 = 40;

/// Largest number of writers that counter-based prefixes can keep apart.
pub const MAX_COUNTER_WRITERS: usize = 1 << (u64::BITS - EPOCH_BITS);

/// A synthesized key.
pub type Key = [u8; KEY_LEN];

/// Encodes `prefix` and `sequence` into a key.
pub fn make_key(prefix: u64, sequence: u64) -> Key {
    let mut key = [0; KEY_LEN];
    key[..8].copy_from_slice(&prefix.to_le_bytes());
    key[8..].copy_from_slice(&sequence.to_le_bytes());
    key
}

/// Decodes a key into its prefix and sequence number.
///
/// Returns `None` if the key does not have the synthesized length.
pub fn split_key(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != KEY_LEN {
        return None;
    }
    let prefix = u64::from_le_bytes(key[..8].try_into().ok()?);
    let sequence = u64::from_le_bytes(key[8..].try_into().ok()?);
    Some((prefix, sequence))
}

/// How each epoch obtains its unique key prefix.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixStrategy {
    /// Timestamps for a single writer, counters for multiple writers.
    #[default]
    Auto,
    /// The wall-clock time in nanoseconds at the start of the epoch.
    ///
    /// Only valid with a single writer.
    Timestamp,
    /// The writer index in the high bits and the writer's epoch counter in the low bits.
    Counter,
}

impl PrefixStrategy {
    /// Resolves [`Auto`](Self::Auto) for the given number of writers.
    pub fn resolve(self, writers: usize) -> Self {
        match self {
            Self::Auto if writers > 1 => Self::Counter,
            Self::Auto => Self::Timestamp,
            strategy => strategy,
        }
    }
}

/// Generates the prefix for every epoch of one writer.
#[derive(Debug)]
pub struct Prefixes {
    strategy: PrefixStrategy,
    worker: u64,
    epoch: u64,
    last: Option<u64>,
}

impl Prefixes {
    /// Creates the prefix sequence for writer `worker` out of `writers`.
    pub fn new(strategy: PrefixStrategy, writers: usize, worker: usize) -> Self {
        Self {
            strategy: strategy.resolve(writers),
            worker: worker as u64,
            epoch: 0,
            last: None,
        }
    }

    /// Returns the prefix for the next epoch.
    pub fn next_prefix(&mut self) -> u64 {
        let candidate = match self.strategy {
            PrefixStrategy::Counter | PrefixStrategy::Auto => {
                (self.worker << EPOCH_BITS) | (self.epoch & ((1 << EPOCH_BITS) - 1))
            }
            PrefixStrategy::Timestamp => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|since| since.as_nanos() as u64)
                .unwrap_or_default(),
        };
        self.epoch += 1;

        // Clocks may stall or step backwards between epochs.
        let prefix = match self.last {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last = Some(prefix);
        prefix
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn key_layout() {
        for (prefix, sequence) in [(0, 0), (1, 2), (u64::MAX, 42), (0xdead_beef, u64::MAX)] {
            let key = make_key(prefix, sequence);
            assert_eq!(key.len(), KEY_LEN);
            assert_eq!(u64::from_le_bytes(key[..8].try_into().unwrap()), prefix);
            assert_eq!(u64::from_le_bytes(key[8..].try_into().unwrap()), sequence);
            assert_eq!(split_key(&key), Some((prefix, sequence)));
        }

        assert_eq!(make_key(1, 2)[0], 1);
        assert_eq!(make_key(1, 2)[8], 2);
        assert_eq!(split_key(b"short"), None);
    }

    #[test]
    fn distinct_prefixes_give_disjoint_keys() {
        let first: HashSet<_> = (0..1000).map(|i| make_key(7, i)).collect();
        let second: HashSet<_> = (0..1000).map(|i| make_key(8, i)).collect();

        assert_eq!(first.len(), 1000);
        assert!(first.is_disjoint(&second));
    }

    #[test]
    fn auto_strategy() {
        assert_eq!(PrefixStrategy::Auto.resolve(1), PrefixStrategy::Timestamp);
        assert_eq!(PrefixStrategy::Auto.resolve(4), PrefixStrategy::Counter);
        assert_eq!(PrefixStrategy::Counter.resolve(1), PrefixStrategy::Counter);
    }

    #[test]
    fn counter_prefixes_are_namespaced_per_writer() {
        let mut seen = HashSet::new();
        for worker in 0..4 {
            let mut prefixes = Prefixes::new(PrefixStrategy::Counter, 4, worker);
            for epoch in 0..100u64 {
                let prefix = prefixes.next_prefix();
                assert_eq!(prefix >> EPOCH_BITS, worker as u64);
                assert_eq!(prefix & ((1 << EPOCH_BITS) - 1), epoch);
                assert!(seen.insert(prefix));
            }
        }
    }

    #[test]
    fn timestamp_prefixes_strictly_increase() {
        let mut prefixes = Prefixes::new(PrefixStrategy::Auto, 1, 0);
        let mut last = prefixes.next_prefix();
        for _ in 0..1000 {
            let next = prefixes.next_prefix();
            assert!(next > last);
            last = next;
        }
    }
}
