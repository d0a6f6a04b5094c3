//! Error types for the write path.

use thiserror::Error;

/// Errors surfaced by a write cycle.
///
/// All failures are synchronous and propagate straight to the caller of the
/// triggering write; there are no retries anywhere in this layer.
///
/// Reading a property that is absent from state is not an error (it yields
/// [`Value::Null`](serde_json::Value::Null)), and a computed entry with an
/// empty dependency set is not an error either (it becomes a one-shot static
/// value).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A watcher reaction failed.
    ///
    /// The state change that triggered the reaction has already been
    /// committed and is not rolled back; watchers registered after the
    /// failing one are skipped for that dispatch pass.
    #[error("watcher for `{property}` failed: {error}")]
    Watcher {
        /// Property name the failing reaction was registered under.
        property: String,
        /// The reaction's error.
        error: anyhow::Error,
    },

    /// A middleware stage failed.
    ///
    /// The pipeline aborts at that stage; no commit occurs if the failure
    /// happened before the commit step.
    #[error("middleware stage failed: {error}")]
    Middleware {
        /// The stage's error.
        error: anyhow::Error,
    },

    /// A value-form update was not a JSON object.
    #[error("update must be a JSON object, got {found}")]
    InvalidUpdate {
        /// JSON kind of the rejected value.
        found: &'static str,
    },
}

impl StoreError {
    /// Wrap a stage error as [`StoreError::Middleware`].
    pub fn middleware(error: impl Into<anyhow::Error>) -> Self {
        Self::Middleware {
            error: error.into(),
        }
    }
}
