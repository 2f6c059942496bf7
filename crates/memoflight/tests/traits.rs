// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compile-time checks of auto traits on public types.

use memoflight::{ArgMatcher, CacheOptions, CacheTelemetry, Call, CallError, MergeCache, MergeCacheBuilder, Outcome, RevalidationBus};
use static_assertions::assert_impl_all;

assert_impl_all!(MergeCache<String, Vec<u8>, String>: Clone, std::fmt::Debug, Send, Sync);
assert_impl_all!(MergeCacheBuilder<String, Vec<u8>, String>: std::fmt::Debug, Send, Sync);
assert_impl_all!(Call<Vec<u8>, String>: std::future::Future, Unpin, Send);
assert_impl_all!(CallError<String>: std::error::Error, Clone, Send, Sync);
assert_impl_all!(Outcome<Vec<u8>, String>: Send);
assert_impl_all!(ArgMatcher<String>: Clone, Send, Sync);
assert_impl_all!(RevalidationBus: Clone, Default, std::fmt::Debug, Send, Sync);
assert_impl_all!(CacheTelemetry: Clone, Default, Send, Sync);
assert_impl_all!(CacheOptions: Clone, Default, PartialEq, Send, Sync);
