//! Progress-callback trait for export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the exporter renders artifacts and bundles batches.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a broadcast channel, a job record, or a
//! terminal spinner without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because one [`crate::Exporter`]
//! may serve many concurrent requests.
//!
//! # Example
//!
//! ```rust
//! use edgequake_export::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct DegradedCounter(AtomicUsize);
//!
//! impl ExportProgressCallback for DegradedCounter {
//!     fn on_block_degraded(&self, reference: &str, reason: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("placeholder for {reference}: {reason}");
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(DegradedCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the exporter as it produces artifacts.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Methods may be called concurrently when the same
/// exporter serves several requests at once.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first entry of a batch is rendered.
    fn on_batch_start(&self, total_entries: usize) {
        let _ = total_entries;
    }

    /// Called before each batch entry is rendered.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: number of entries in the batch
    /// * `filename`: relative name the entry will carry in the archive
    fn on_entry_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a single artifact has been written.
    ///
    /// Single-artifact entry points report `index = total = 1`.
    fn on_entry_complete(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called when one block was replaced by a placeholder.
    ///
    /// # Arguments
    /// * `reference`: image query, URL or path that failed
    /// * `reason`: human-readable [`crate::error::BlockError`] text
    fn on_block_degraded(&self, reference: &str, reason: &str) {
        let _ = (reference, reason);
    }

    /// Called once after the archive of a batch has been written.
    fn on_batch_complete(&self, total_entries: usize, archive_url: &str) {
        let _ = (total_entries, archive_url);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        degraded: Mutex<Vec<String>>,
        batch_total: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_entries: usize) {
            self.batch_total.store(total_entries, Ordering::SeqCst);
        }

        fn on_entry_start(&self, _index: usize, _total: usize, _filename: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_entry_complete(&self, _index: usize, _total: usize, _url: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_degraded(&self, reference: &str, _reason: &str) {
            self.degraded.lock().unwrap().push(reference.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_entry_start(1, 3, "a.pdf");
        cb.on_entry_complete(1, 3, "http://localhost/a.pdf");
        cb.on_block_degraded("cats", "not found");
        cb.on_batch_complete(3, "http://localhost/archive.zip");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(2);
        tracker.on_entry_start(1, 2, "a.pdf");
        tracker.on_block_degraded("image_query:cats", "No image found");
        tracker.on_entry_complete(1, 2, "u1");
        tracker.on_entry_start(2, 2, "b.csv");
        tracker.on_entry_complete(2, 2, "u2");

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(
            tracker.degraded.lock().unwrap().as_slice(),
            ["image_query:cats"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_entry_complete(1, 1, "u");
    }
}
