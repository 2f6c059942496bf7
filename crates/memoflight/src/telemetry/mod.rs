// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging and optional OpenTelemetry metrics for merge cache activity.
//!
//! Every activity is emitted as a `tracing` event named `cache.event` when logging is enabled.
//! With the `metrics` feature, activities are also counted on a `cache.event.count` counter and
//! the number of settled entries is reported on a `cache.size` gauge.

use std::sync::Arc;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Meter, MeterProvider},
};

use crate::cache::CacheName;

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Telemetry sink for a merge cache.
///
/// The default value records nothing. Construct one and pass it to the builder via
/// [`telemetry()`](crate::MergeCacheBuilder::telemetry).
///
/// # Examples
///
/// ```
/// use memoflight::CacheTelemetry;
///
/// let telemetry = CacheTelemetry::new(true);
/// assert!(telemetry.logging_enabled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    cache_size: Option<Gauge<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Call,
    Settle,
    Sweep,
    Revalidate,
    Dispose,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Call => "cache.call",
            Self::Settle => "cache.settle",
            Self::Sweep => "cache.sweep",
            Self::Revalidate => "cache.revalidate",
            Self::Dispose => "cache.dispose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Expired,
    Merged,
    Invoked,
    Stored,
    Failed,
    Evicted,
    Revalidated,
    Disposed,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Expired => "cache.expired",
            Self::Merged => "cache.merged",
            Self::Invoked => "cache.invoked",
            Self::Stored => "cache.stored",
            Self::Failed => "cache.failed",
            Self::Evicted => "cache.evicted",
            Self::Revalidated => "cache.revalidated",
            Self::Disposed => "cache.disposed",
        }
    }

    pub(crate) fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Merged | Self::Invoked | Self::Stored => Severity::Debug,
            Self::Expired | Self::Evicted | Self::Revalidated | Self::Disposed => Severity::Info,
            Self::Failed => Severity::Warn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Warn,
}

impl CacheTelemetry {
    /// Creates a telemetry sink that only logs, if `logging_enabled` is set.
    #[must_use]
    pub fn new(logging_enabled: bool) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logging_enabled,
                ..TelemetryInner::default()
            }),
        }
    }

    /// Creates a telemetry sink that records metrics on `meter` and optionally logs.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_meter(logging_enabled: bool, meter: &Meter) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logging_enabled,
                event_counter: Some(metrics::create_event_counter(meter)),
                cache_size: Some(metrics::create_cache_size_gauge(meter)),
            }),
        }
    }

    /// Creates a telemetry sink that records metrics under the `memoflight` instrumentation
    /// scope of `meter_provider` and optionally logs.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_meter_provider(logging_enabled: bool, meter_provider: &dyn MeterProvider) -> Self {
        Self::with_meter(logging_enabled, &metrics::create_meter(meter_provider))
    }

    /// Returns `true` if activity is emitted as `tracing` events.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.inner.logging_enabled
    }

    /// Records `count` occurrences of an activity.
    pub(crate) fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(counter) = &self.inner.event_counter {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name),
                KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            counter.add(u64::try_from(count).unwrap_or(u64::MAX), &attrs);
        }

        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, count);
        }
    }

    /// Records the number of settled entries.
    #[cfg_attr(not(any(feature = "metrics", test)), expect(unused_variables, reason = "size only feeds metrics"))]
    pub(crate) fn record_size(&self, cache_name: CacheName, size: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(gauge) = &self.inner.cache_size {
            gauge.record(
                u64::try_from(size).unwrap_or(u64::MAX),
                &[KeyValue::new(attributes::CACHE_NAME, cache_name)],
            );
        }
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: usize) {
        let op = operation.as_str();
        let act = activity.as_str();

        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.count = count,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Warn => emit_event!(warn),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    #[test]
    fn operation_as_str() {
        assert_eq!(CacheOperation::Call.as_str(), "cache.call");
        assert_eq!(CacheOperation::Settle.as_str(), "cache.settle");
        assert_eq!(CacheOperation::Sweep.as_str(), "cache.sweep");
        assert_eq!(CacheOperation::Revalidate.as_str(), "cache.revalidate");
        assert_eq!(CacheOperation::Dispose.as_str(), "cache.dispose");
    }

    #[test]
    fn activity_severity() {
        assert_eq!(CacheActivity::Hit.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Merged.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Evicted.severity(), Severity::Info);
        assert_eq!(CacheActivity::Revalidated.severity(), Severity::Info);
        assert_eq!(CacheActivity::Failed.severity(), Severity::Warn);
    }

    #[test]
    fn metrics_record_emits_attributes() {
        let tester = MetricTester::new();
        let meter = tester.meter_provider().meter("memoflight");
        let telemetry = CacheTelemetry::with_meter(false, &meter);

        telemetry.record("users", CacheOperation::Call, CacheActivity::Merged, 1);

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::CACHE_NAME, "users"),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, "cache.call"),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, "cache.merged"),
        ]);
    }

    #[test]
    fn meter_provider_scope_is_used() {
        let tester = MetricTester::new();
        let telemetry = CacheTelemetry::with_meter_provider(false, tester.meter_provider());

        telemetry.record("scoped", CacheOperation::Revalidate, CacheActivity::Revalidated, 2);

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::CACHE_NAME, "scoped"),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, "cache.revalidated"),
        ]);
    }

    #[test]
    fn metrics_record_size_emits_cache_name() {
        let tester = MetricTester::new();
        let meter = tester.meter_provider().meter("memoflight");
        let telemetry = CacheTelemetry::with_meter(false, &meter);

        telemetry.record_size("sized", 3);

        tester.assert_attributes_contain(&[KeyValue::new(attributes::CACHE_NAME, "sized")]);
    }

    #[test]
    fn logs_contain_all_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new(true).record("orders", CacheOperation::Sweep, CacheActivity::Evicted, 4);

        capture.assert_contains(attributes::CACHE_NAME);
        capture.assert_contains(attributes::CACHE_OPERATION_NAME);
        capture.assert_contains(attributes::CACHE_ACTIVITY_NAME);
        capture.assert_contains(attributes::CACHE_COUNT_NAME);
        capture.assert_contains(attributes::CACHE_EVENT_NAME);
        capture.assert_contains("orders");
        capture.assert_contains("cache.evicted");
        capture.assert_contains("INFO");
    }

    #[test]
    fn failures_are_logged_as_warnings() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new(true).record("orders", CacheOperation::Call, CacheActivity::Failed, 1);

        capture.assert_contains("WARN");
    }

    #[test]
    fn disabled_telemetry_emits_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let telemetry = CacheTelemetry::default();
        telemetry.record("quiet", CacheOperation::Call, CacheActivity::Hit, 1);
        telemetry.record_size("quiet", 10);

        assert!(!telemetry.logging_enabled());
        assert!(capture.output().is_empty());
    }
}
