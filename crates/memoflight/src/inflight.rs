// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registry of calls that are still executing.

use std::sync::Weak;

use futures::future::{BoxFuture, Shared};

use crate::matcher::ArgMatcher;

/// A deferred call shared by every caller that merged onto it.
pub(crate) type SharedCall<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Identifies a pending call independently of its key.
pub(crate) type CallId = u64;

/// A call that has been started but has not settled yet.
pub(crate) struct PendingCall<A, V, E> {
    id: CallId,
    key: A,
    call: SharedCall<V, E>,
    waiters: usize,
}

impl<A, V, E> PendingCall<A, V, E> {
    pub(crate) fn key(&self) -> &A {
        &self.key
    }

    pub(crate) fn into_key(self) -> A {
        self.key
    }

    /// Number of callers waiting on this call, the one that started it included.
    pub(crate) fn waiters(&self) -> usize {
        self.waiters
    }
}

/// Pending calls in the order they were started.
///
/// Holds at most one call per logical key: a caller whose arguments match a pending call
/// joins it instead of registering a new one.
pub(crate) struct InFlightRegistry<A, V, E> {
    calls: Vec<PendingCall<A, V, E>>,
    next_id: CallId,
}

impl<A, V, E> Default for InFlightRegistry<A, V, E> {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 0,
        }
    }
}

impl<A, V, E> InFlightRegistry<A, V, E> {
    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    /// Reserves the identifier for the next call to be registered.
    pub(crate) fn next_id(&mut self) -> CallId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Removes the call registered under `id`.
    pub(crate) fn take(&mut self, id: CallId) -> Option<PendingCall<A, V, E>> {
        let index = self.calls.iter().position(|pending| pending.id == id)?;
        Some(self.calls.remove(index))
    }

    /// Drops one waiter from the call registered under `id`.
    ///
    /// Returns the call once its last waiter is gone, so the caller can drop it outside of any
    /// lock. A call that already settled is not registered anymore and is left alone.
    pub(crate) fn release(&mut self, id: CallId) -> Option<PendingCall<A, V, E>> {
        let index = self.calls.iter().position(|pending| pending.id == id)?;
        let pending = &mut self.calls[index];
        pending.waiters = pending.waiters.saturating_sub(1);
        (pending.waiters == 0).then(|| self.calls.remove(index))
    }
}

impl<A, V, E> InFlightRegistry<A, V, E>
where
    V: Clone,
    E: Clone,
{
    /// Joins the pending call matching `args`, if there is one.
    pub(crate) fn join(&mut self, matcher: &ArgMatcher<A>, args: &A) -> Option<(CallId, SharedCall<V, E>)> {
        let index = matcher.position(self.calls.iter().map(PendingCall::key), args)?;
        let pending = &mut self.calls[index];
        pending.waiters += 1;
        Some((pending.id, pending.call.clone()))
    }

    /// Registers a call started under `id` and returns a handle for the caller that started it.
    pub(crate) fn register(&mut self, id: CallId, key: A, call: SharedCall<V, E>) -> SharedCall<V, E> {
        let handle = call.clone();
        self.calls.push(PendingCall { id, key, call, waiters: 1 });
        handle
    }
}

/// Gives waiters back to the registry that handed them out.
pub(crate) trait Waiters: Send + Sync {
    fn release(&self, id: CallId);
}

/// One caller's claim on a pending call, released when the caller's [`Call`](crate::Call) drops.
///
/// A call whose waiters all left before it settled is removed from the registry. Nothing drives
/// it anymore, so it never settles on its own.
pub(crate) struct Waiter {
    registry: Weak<dyn Waiters>,
    id: CallId,
}

impl Waiter {
    pub(crate) fn new(registry: Weak<dyn Waiters>, id: CallId) -> Self {
        Self { registry, id }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.id);
        }
    }
}

impl<A, V, E> std::fmt::Debug for InFlightRegistry<A, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("len", &self.calls.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
