// ABOUTME: Error type shared by every PersistentState backend.
// ABOUTME: Separates storage failures from caller-driven iteration aborts; absence is never an error.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error payload carried by storage failures and visitor aborts.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by PersistentState operations.
///
/// A missing bucket or key is not represented here: reads report absence as
/// `Ok(None)` and iteration over an absent bucket simply visits nothing.
#[derive(Debug, Error)]
pub enum StateError {
    /// The underlying engine could not be reached or queried.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    /// The backend has released its resources and cannot serve the call.
    #[error("persistent state is closed")]
    Closed,

    /// A `for_each` visitor aborted the iteration with its own error.
    #[error("iteration aborted: {0}")]
    Visit(#[source] BoxError),

    /// A `for_each` visitor asked to stop without supplying a reason.
    #[error("iteration stopped by visitor")]
    Stop,
}

impl StateError {
    /// Wrap any engine error as a storage failure.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Wrap an arbitrary value as a visitor abort signal.
    pub fn visit(err: impl Into<BoxError>) -> Self {
        Self::Visit(err.into())
    }

    /// Borrow the payload of a visitor abort, if this is one.
    pub fn visit_payload(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Visit(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// True for errors produced by a visitor rather than by the backend.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Visit(_) | Self::Stop)
    }
}
