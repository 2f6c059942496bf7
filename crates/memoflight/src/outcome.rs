// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The two execution shapes a wrapped function can produce.

use std::fmt::Debug;

use futures::future::{BoxFuture, FutureExt};

/// What a wrapped function returns when the cache invokes it.
///
/// The function declares its execution shape explicitly:
///
/// - [`Outcome::Ready`] for a result computed synchronously. It is stored (subject to the cache
///   policy) and handed back to the caller immediately.
/// - [`Outcome::Deferred`] for a result that settles later. The cache registers the call as
///   in flight so that concurrent callers with matching arguments join it instead of invoking
///   the function again.
///
/// # Examples
///
/// ```
/// use memoflight::Outcome;
///
/// let ready: Outcome<u32, String> = Outcome::value(7);
/// assert!(!ready.is_deferred());
///
/// let deferred: Outcome<u32, String> = Outcome::deferred(async { Ok(7) });
/// assert!(deferred.is_deferred());
/// ```
pub enum Outcome<V, E> {
    /// The function completed synchronously.
    Ready(Result<V, E>),

    /// The function returned a computation that settles later.
    Deferred(BoxFuture<'static, Result<V, E>>),
}

impl<V, E> Outcome<V, E> {
    /// A synchronous successful result.
    pub fn value(value: V) -> Self {
        Self::Ready(Ok(value))
    }

    /// A synchronous failure.
    pub fn error(error: E) -> Self {
        Self::Ready(Err(error))
    }

    /// A result that settles when `future` completes.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Returns `true` if the result settles later.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl<V, E> From<Result<V, E>> for Outcome<V, E> {
    fn from(result: Result<V, E>) -> Self {
        Self::Ready(result)
    }
}

impl<V: Debug, E: Debug> Debug for Outcome<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.debug_tuple("Deferred").finish_non_exhaustive(),
        }
    }
}
