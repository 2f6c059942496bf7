// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Argument matching for cache keys.

use std::{fmt::Debug, sync::Arc};

type MatchFn<A> = dyn Fn(&A, &A) -> bool + Send + Sync;

/// Decides whether a stored argument tuple represents the same logical call as a candidate.
///
/// Keys are never hashed. Every lookup walks the stored keys in order and asks the matcher,
/// so any symmetric equivalence relation works, including ones over values that cannot be
/// hashed at all.
///
/// # Examples
///
/// ```
/// use memoflight::ArgMatcher;
///
/// let exact = ArgMatcher::<(u32, String)>::deep_eq();
/// assert!(exact.matches(&(1, "a".to_string()), &(1, "a".to_string())));
///
/// let ignore_case = ArgMatcher::new(|stored: &String, candidate: &String| stored.eq_ignore_ascii_case(candidate));
/// assert!(ignore_case.matches(&"Key".to_string(), &"KEY".to_string()));
/// ```
pub struct ArgMatcher<A> {
    matches: Arc<MatchFn<A>>,
}

impl<A> ArgMatcher<A> {
    /// Creates a matcher from a comparison function.
    ///
    /// The function receives the stored key first and the candidate arguments second.
    pub fn new<F>(matches: F) -> Self
    where
        F: Fn(&A, &A) -> bool + Send + Sync + 'static,
    {
        Self { matches: Arc::new(matches) }
    }

    /// Creates a matcher that compares arguments with [`PartialEq`].
    #[must_use]
    pub fn deep_eq() -> Self
    where
        A: PartialEq + 'static,
    {
        Self::new(|stored: &A, candidate: &A| stored == candidate)
    }

    /// Returns `true` if `stored` and `candidate` represent the same logical call.
    #[must_use]
    pub fn matches(&self, stored: &A, candidate: &A) -> bool {
        (self.matches)(stored, candidate)
    }

    /// Returns the index of the first key in `keys` matching `candidate`.
    pub(crate) fn position<'a>(&self, keys: impl IntoIterator<Item = &'a A>, candidate: &A) -> Option<usize>
    where
        A: 'a,
    {
        keys.into_iter().position(|stored| self.matches(stored, candidate))
    }
}

impl<A> Clone for ArgMatcher<A> {
    fn clone(&self) -> Self {
        Self {
            matches: Arc::clone(&self.matches),
        }
    }
}

impl<A> Debug for ArgMatcher<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgMatcher").finish_non_exhaustive()
    }
}
