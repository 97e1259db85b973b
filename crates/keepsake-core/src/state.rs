// ABOUTME: The PersistentState trait, the contract every keepsake backend implements.
// ABOUTME: Buckets namespace keys, absence is Ok(None), and visitors can abort iteration early.

use std::collections::BTreeMap;

use crate::error::StateError;

/// Introspection view of a whole store: bucket name to key to value, with
/// bytes rendered as lossy UTF-8. Intended for dumps and debugging only.
pub type Snapshot = BTreeMap<String, BTreeMap<String, String>>;

/// Callback invoked once per (key, value) pair by [`PersistentState::for_each`].
/// Returning an error stops the iteration and hands that error back to the caller.
pub type Visitor<'a> = dyn FnMut(&[u8], &[u8]) -> Result<(), StateError> + 'a;

/// A bucket-namespaced key-value store that survives between runs.
///
/// Buckets come into existence on the first `set` into them and disappear
/// through `delete_bucket`. A bucket with no pairs reads the same as one that
/// never existed. Absence is reported as `Ok(None)`, which is distinct from
/// a present empty value.
///
/// Implementations define no internal locking. Mutating calls take `&mut self`
/// so a single caller owns the store while it writes.
pub trait PersistentState {
    /// Return the value stored under (bucket, key), or `None` if there is none.
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    /// Create the bucket if needed and insert or overwrite the pair.
    /// No observer sees the bucket without the pair.
    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<(), StateError>;

    /// Remove the pair. Missing pairs and missing buckets are not errors.
    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<(), StateError>;

    /// Remove the bucket and every pair in it. A missing bucket is not an error.
    fn delete_bucket(&mut self, bucket: &[u8]) -> Result<(), StateError>;

    /// Call `visit` once for each pair currently in the bucket, in no
    /// particular order. The first error returned by `visit` ends the
    /// iteration and is returned unchanged.
    fn for_each(&self, bucket: &[u8], visit: &mut Visitor<'_>) -> Result<(), StateError>;

    /// Copy every pair of every bucket into `other` through `other.set`.
    /// Stops at the first failure, leaving the pairs already copied in place.
    fn copy_to(&self, other: &mut dyn PersistentState) -> Result<(), StateError>;

    /// Return the entire store as a nested map.
    fn data(&self) -> Result<Snapshot, StateError>;

    /// Release backend resources.
    fn close(&mut self) -> Result<(), StateError>;

    /// Collect the keys currently stored in a bucket.
    fn keys(&self, bucket: &[u8]) -> Result<Vec<Vec<u8>>, StateError> {
        let mut keys = Vec::new();
        self.for_each(bucket, &mut |key, _| {
            keys.push(key.to_vec());
            Ok(())
        })?;
        Ok(keys)
    }

    /// Whether a value is stored under (bucket, key).
    fn contains(&self, bucket: &[u8], key: &[u8]) -> Result<bool, StateError> {
        Ok(self.get(bucket, key)?.is_some())
    }
}

/// Record one pair into a snapshot, creating the bucket entry on demand.
pub fn insert_into_snapshot(snapshot: &mut Snapshot, bucket: &[u8], key: &[u8], value: &[u8]) {
    snapshot
        .entry(String::from_utf8_lossy(bucket).into_owned())
        .or_default()
        .insert(
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
}
