// ABOUTME: In-memory PersistentState backend built on nested hash maps.
// ABOUTME: Used for fast hermetic tests; close is a no-op and the store stays usable afterwards.

use std::collections::HashMap;

use crate::error::StateError;
use crate::state::{PersistentState, Snapshot, Visitor, insert_into_snapshot};

/// A PersistentState held entirely in memory.
///
/// Buckets are the entries of the outer map; there is no separate record of
/// which buckets exist.
#[derive(Debug, Clone, Default)]
pub struct MockPersistentState {
    buckets: HashMap<Vec<u8>, HashMap<Vec<u8>, Vec<u8>>>,
}

impl MockPersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pairs across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(Vec<u8>, Vec<u8>, Vec<u8>)> for MockPersistentState {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, Vec<u8>, Vec<u8>)>>(iter: I) -> Self {
        let mut buckets: HashMap<Vec<u8>, HashMap<Vec<u8>, Vec<u8>>> = HashMap::new();
        for (bucket, key, value) in iter {
            buckets.entry(bucket).or_default().insert(key, value);
        }
        Self { buckets }
    }
}

impl PersistentState for MockPersistentState {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self
            .buckets
            .get(bucket)
            .and_then(|pairs| pairs.get(key))
            .cloned())
    }

    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.buckets
            .entry(bucket.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<(), StateError> {
        if let Some(pairs) = self.buckets.get_mut(bucket) {
            pairs.remove(key);
        }
        Ok(())
    }

    fn delete_bucket(&mut self, bucket: &[u8]) -> Result<(), StateError> {
        self.buckets.remove(bucket);
        Ok(())
    }

    fn for_each(&self, bucket: &[u8], visit: &mut Visitor<'_>) -> Result<(), StateError> {
        let Some(pairs) = self.buckets.get(bucket) else {
            return Ok(());
        };

        // Iterate a copy taken now so the visitor sees the bucket as it was at call time.
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = pairs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in &pairs {
            visit(key, value)?;
        }
        Ok(())
    }

    fn copy_to(&self, other: &mut dyn PersistentState) -> Result<(), StateError> {
        for (bucket, pairs) in &self.buckets {
            for (key, value) in pairs {
                other.set(bucket, key, value)?;
            }
        }
        tracing::debug!(pairs = self.len(), "copied in-memory state");
        Ok(())
    }

    fn data(&self) -> Result<Snapshot, StateError> {
        let mut snapshot = Snapshot::new();
        for (bucket, pairs) in &self.buckets {
            for (key, value) in pairs {
                insert_into_snapshot(&mut snapshot, bucket, key, value);
            }
        }
        Ok(snapshot)
    }

    fn close(&mut self) -> Result<(), StateError> {
        Ok(())
    }
}
