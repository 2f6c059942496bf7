// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Throttling and scheduling of entry store sweeps.

use std::time::{Duration, Instant};

/// Minimum time between two sweeps of the same cache.
pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Where a due sweep runs.
///
/// Inline is the default, and the fallback for background sweeps requested outside a Tokio
/// runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum SweepMode {
    /// Right after the call step that triggered it, once the state lock is released.
    #[default]
    Inline,

    /// On a task spawned onto the current Tokio runtime.
    #[cfg(feature = "tokio")]
    Background,
}

/// Monotonic guard deciding when the next sweep is due.
///
/// Sweeps are only ever requested by cache calls, so an idle cache never sweeps.
#[derive(Debug, Default)]
pub(crate) struct SweepGuard {
    last_run: Option<Instant>,
    scheduled: bool,
}

impl SweepGuard {
    /// Claims the next sweep if one is due and none is already scheduled.
    pub(crate) fn try_schedule(&mut self, now: Instant) -> bool {
        if self.scheduled {
            return false;
        }
        let due = self
            .last_run
            .is_none_or(|last| now.saturating_duration_since(last) >= SWEEP_INTERVAL);
        self.scheduled = due;
        due
    }

    /// Gives up a claimed sweep that never ran, so the next request may claim it again.
    #[cfg(feature = "tokio")]
    pub(crate) fn abandon(&mut self) {
        self.scheduled = false;
    }

    /// Marks a sweep as finished at `now`.
    pub(crate) fn complete(&mut self, now: Instant) {
        self.scheduled = false;
        self.last_run = Some(now);
    }
}
