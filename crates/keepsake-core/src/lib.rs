// ABOUTME: Core library for keepsake, defining the bucket-namespaced PersistentState contract.
// ABOUTME: Ships the in-memory backend and the conformance harness every backend is tested against.

pub mod error;
pub mod mock;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::StateError;
pub use mock::MockPersistentState;
pub use state::{PersistentState, Snapshot, Visitor};
