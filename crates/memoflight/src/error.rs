// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for merge cache construction and calls.

/// The error returned by [`MergeCache::call`](crate::MergeCache::call).
///
/// A failure of the wrapped function is carried unchanged in [`CallError::Failed`], so every
/// caller that requested or merged onto a call observes the same error value the function
/// produced.
///
/// # Examples
///
/// ```
/// use memoflight::CallError;
///
/// let error: CallError<&str> = CallError::Failed("not found");
/// assert_eq!(error.failure(), Some(&"not found"));
/// assert!(!error.is_disposed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError<E> {
    /// The cache was disposed before the call was made.
    #[error("the merge cache has been disposed")]
    Disposed,

    /// The wrapped function failed with this error.
    #[error("{0}")]
    Failed(E),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was rejected because the cache was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns the error produced by the wrapped function, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Disposed => None,
        }
    }

    /// Consumes the error and returns the error produced by the wrapped function, if any.
    #[must_use]
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Disposed => None,
        }
    }
}

/// An error raised while building a [`MergeCache`](crate::MergeCache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The tag is reserved for revalidating every cache on a bus.
    #[error("tag `{0}` is reserved for revalidating every cache and cannot be subscribed to")]
    ReservedTag(String),
}
