// ABOUTME: End-to-end smoke test for state persisted across separate runs.
// ABOUTME: Writes through one store, reopens it, and cross-checks against the in-memory backend.

use keepsake_core::testing::{AfterClose, check_persistent_state};
use keepsake_core::{MockPersistentState, PersistentState, StateError};
use keepsake_store::SqlitePersistentState;

#[test]
fn smoke_test_state_across_runs() {
    // 1. First run writes some state and closes the database
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("keepsake").join("state.db");

    let mut first_run = SqlitePersistentState::open(&db_path).unwrap();
    first_run.set(b"entries", b"/home/user/.bashrc", b"sha256:aa").unwrap();
    first_run.set(b"entries", b"/home/user/.profile", b"sha256:bb").unwrap();
    first_run.set(b"scripts", b"install-packages", b"").unwrap();
    first_run.close().unwrap();

    // 2. Second run sees everything the first run stored
    let mut second_run = SqlitePersistentState::open(&db_path).unwrap();
    assert_eq!(
        second_run.get(b"entries", b"/home/user/.bashrc").unwrap(),
        Some(b"sha256:aa".to_vec())
    );
    assert_eq!(
        second_run.get(b"scripts", b"install-packages").unwrap(),
        Some(Vec::new()),
        "empty values survive a reopen"
    );

    // 3. An in-memory copy matches the durable snapshot exactly
    let mut mirror = MockPersistentState::new();
    second_run.copy_to(&mut mirror).unwrap();
    assert_eq!(mirror.len(), 3);
    assert_eq!(mirror.data().unwrap(), second_run.data().unwrap());

    // 4. Early abort surfaces the visitor's own signal
    let mut visited = 0;
    let err = second_run
        .for_each(b"entries", &mut |_, _| {
            visited += 1;
            Err(StateError::Stop)
        })
        .unwrap_err();
    assert!(matches!(err, StateError::Stop));
    assert_eq!(visited, 1);

    // 5. Bucket deletion persists too
    second_run.delete_bucket(b"entries").unwrap();
    second_run.close().unwrap();

    let third_run = SqlitePersistentState::open(&db_path).unwrap();
    assert!(third_run.keys(b"entries").unwrap().is_empty());
    assert_eq!(third_run.data().unwrap().len(), 1);
}

#[test]
fn smoke_test_backends_share_one_contract() {
    check_persistent_state(MockPersistentState::new, AfterClose::Readable);
    check_persistent_state(
        || SqlitePersistentState::open_in_memory().unwrap(),
        AfterClose::Rejected,
    );
}
