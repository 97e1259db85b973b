// ABOUTME: Conformance harness run against every PersistentState backend.
// ABOUTME: Pins down absence, overwrite, iteration-abort, copy, and post-close behavior.

use std::io;

use crate::error::StateError;
use crate::state::{PersistentState, Snapshot};

/// What a backend promises about reads once `close` has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterClose {
    /// Previously stored pairs stay readable and writable.
    Readable,
    /// Every operation fails with `StateError::Closed`.
    Rejected,
}

/// Run the core contract scenario against fresh stores built by `constructor`.
///
/// Two stores are built: one that is written, iterated and closed, and one
/// that receives a copy of the first.
pub fn check_persistent_state<S, F>(mut constructor: F, after_close: AfterClose)
where
    S: PersistentState,
    F: FnMut() -> S,
{
    let bucket: &[u8] = b"bucket";
    let key: &[u8] = b"key";
    let value: &[u8] = b"value";

    let mut s1 = constructor();

    s1.delete(bucket, value)
        .expect("deleting an absent pair should be a no-op");
    assert_eq!(s1.get(bucket, key).expect("get before set"), None);

    s1.set(bucket, key, value).expect("set");
    assert_eq!(
        s1.get(bucket, key).expect("get after set"),
        Some(value.to_vec())
    );

    let mut visits = 0;
    s1.for_each(bucket, &mut |k, v| {
        visits += 1;
        assert_eq!(k, key);
        assert_eq!(v, value);
        Ok(())
    })
    .expect("for_each");
    assert_eq!(visits, 1, "visitor should run once per pair");

    let mut absent_visits = 0;
    s1.for_each(b"absent", &mut |_, _| {
        absent_visits += 1;
        Ok(())
    })
    .expect("for_each over absent bucket");
    assert_eq!(absent_visits, 0);

    let mut abort_visits = 0;
    let err = s1
        .for_each(bucket, &mut |_, _| {
            abort_visits += 1;
            Err(StateError::visit(io::Error::from(io::ErrorKind::UnexpectedEof)))
        })
        .expect_err("visitor error should be returned");
    assert_eq!(abort_visits, 1);
    let payload = err
        .visit_payload()
        .and_then(|p| p.downcast_ref::<io::Error>())
        .expect("abort payload should come back unchanged");
    assert_eq!(payload.kind(), io::ErrorKind::UnexpectedEof);

    // With several pairs present the first abort must still end the iteration.
    s1.set(bucket, b"second", b"pair").expect("set second");
    let mut stop_visits = 0;
    let err = s1
        .for_each(bucket, &mut |_, _| {
            stop_visits += 1;
            Err(StateError::Stop)
        })
        .expect_err("stop sentinel should be returned");
    assert!(matches!(err, StateError::Stop), "got {err:?}");
    assert_eq!(stop_visits, 1);
    s1.delete(bucket, b"second").expect("delete second");

    let mut s2 = constructor();
    s1.copy_to(&mut s2).expect("copy_to");
    assert_eq!(
        s2.get(bucket, key).expect("get from copy"),
        Some(value.to_vec())
    );
    assert_eq!(s2.get(bucket, b"second").expect("get deleted from copy"), None);

    s1.close().expect("close");

    match after_close {
        AfterClose::Readable => {
            assert_eq!(
                s1.get(bucket, key).expect("get after close"),
                Some(value.to_vec())
            );
            s1.delete(bucket, key).expect("delete after close");
            assert_eq!(s1.get(bucket, key).expect("get after delete"), None);
            assert_no_visits(&s1, bucket);
        }
        AfterClose::Rejected => {
            assert!(
                matches!(s1.get(bucket, key), Err(StateError::Closed)),
                "get after close should be rejected"
            );
            assert!(
                matches!(s1.set(bucket, key, value), Err(StateError::Closed)),
                "set after close should be rejected"
            );
            s1.close().expect("closing twice should be harmless");

            s2.delete(bucket, key).expect("delete");
            assert_eq!(s2.get(bucket, key).expect("get after delete"), None);
            assert_no_visits(&s2, bucket);
        }
    }
}

/// Assert that iterating `bucket` succeeds without calling the visitor.
pub fn assert_no_visits<S: PersistentState + ?Sized>(state: &S, bucket: &[u8]) {
    let mut visits = 0;
    state
        .for_each(bucket, &mut |_, _| {
            visits += 1;
            Ok(())
        })
        .expect("for_each over empty bucket");
    assert_eq!(visits, 0, "an emptied bucket should visit nothing");
}

/// Exercise bucket lifecycle, overwrite and snapshot behavior on a fresh store.
pub fn check_bucket_semantics<S, F>(mut constructor: F)
where
    S: PersistentState,
    F: FnMut() -> S,
{
    let mut state = constructor();

    state.set(b"bucket", b"empty", b"").expect("set empty value");
    assert_eq!(
        state.get(b"bucket", b"empty").expect("get empty value"),
        Some(Vec::new()),
        "an empty value is present, not absent"
    );

    state.set(b"bucket", b"key", b"first").expect("set first");
    state.set(b"bucket", b"key", b"second").expect("overwrite");
    assert_eq!(
        state.get(b"bucket", b"key").expect("get overwritten"),
        Some(b"second".to_vec())
    );
    assert_eq!(state.keys(b"bucket").expect("keys").len(), 2);

    state.delete(b"bucket", b"empty").expect("delete sibling");
    assert_eq!(
        state.get(b"bucket", b"key").expect("sibling survives delete"),
        Some(b"second".to_vec())
    );

    // The same key in another bucket is a different pair.
    state.set(b"other", b"key", b"elsewhere").expect("set other");
    state.set(b"doomed", b"a", b"1").expect("set doomed a");
    state.set(b"doomed", b"b", b"2").expect("set doomed b");

    let mut expected = Snapshot::new();
    expected
        .entry("bucket".to_string())
        .or_default()
        .insert("key".to_string(), "second".to_string());
    expected
        .entry("other".to_string())
        .or_default()
        .insert("key".to_string(), "elsewhere".to_string());
    let doomed = expected.entry("doomed".to_string()).or_default();
    doomed.insert("a".to_string(), "1".to_string());
    doomed.insert("b".to_string(), "2".to_string());
    assert_eq!(state.data().expect("data"), expected);

    state.delete_bucket(b"doomed").expect("delete_bucket");
    assert_eq!(state.get(b"doomed", b"a").expect("get a"), None);
    assert_eq!(state.get(b"doomed", b"b").expect("get b"), None);
    assert!(state.keys(b"doomed").expect("keys of deleted bucket").is_empty());
    assert_eq!(
        state.get(b"other", b"key").expect("other bucket untouched"),
        Some(b"elsewhere".to_vec())
    );

    state
        .delete_bucket(b"never-existed")
        .expect("deleting an absent bucket should be a no-op");

    state.set(b"doomed", b"a", b"again").expect("recreate bucket");
    assert_eq!(
        state.get(b"doomed", b"a").expect("get recreated"),
        Some(b"again".to_vec())
    );
    assert!(!state.contains(b"doomed", b"b").expect("contains"));
}
