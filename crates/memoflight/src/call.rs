// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt::Debug,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    CallError,
    inflight::{SharedCall, Waiter},
};

/// The result of [`MergeCache::call`](crate::MergeCache::call).
///
/// Cached results, synchronous results and rejections are available immediately; calls that
/// started or joined an in-flight computation resolve when it settles. Every caller merged onto
/// the same computation receives a clone of the same outcome.
///
/// Dropping a `Call` does not cancel the underlying computation for the other callers waiting
/// on it. Once every caller waiting on a computation has dropped its `Call`, the computation is
/// abandoned and a later call with matching arguments starts a new one.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Call<V, E> {
    state: CallState<V, E>,
}

enum CallState<V, E> {
    Ready(Option<Result<V, CallError<E>>>),
    InFlight(SharedCall<V, E>, Waiter),
}

impl<V, E> Call<V, E> {
    pub(crate) fn ready(result: Result<V, CallError<E>>) -> Self {
        Self {
            state: CallState::Ready(Some(result)),
        }
    }

    pub(crate) fn in_flight(call: SharedCall<V, E>, waiter: Waiter) -> Self {
        Self {
            state: CallState::InFlight(call, waiter),
        }
    }

    /// Returns `true` if the call resolves without waiting on an in-flight computation.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, CallState::Ready(_))
    }
}

// No field is structurally pinned.
impl<V, E> Unpin for Call<V, E> {}

impl<V, E> Future for Call<V, E>
where
    V: Clone,
    E: Clone,
{
    type Output = Result<V, CallError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            CallState::Ready(result) => Poll::Ready(result.take().expect("`Call` polled after completion")),
            CallState::InFlight(call, _) => Pin::new(call).poll(cx).map(|result| result.map_err(CallError::Failed)),
        }
    }
}

impl<V, E> Debug for Call<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call").field("ready", &self.is_ready()).finish()
    }
}
