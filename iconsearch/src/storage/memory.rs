//! In-memory object store.
//!
//! Holds a fixed set of object paths and resolves them to addresses under a
//! base URL. Individual objects can be scripted to fail or to answer late,
//! and listing can be switched off, which makes the store useful for
//! exercising the search flow without a network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::{BoxFuture, Handle, ObjectStore, ResolvedAddress, StorageError};

/// Scriptable in-memory object store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    listing_error: Mutex<Option<String>>,
    list_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store whose addresses live under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Add an object by its full path.
    pub fn with_object(self, full_path: impl Into<String>) -> Self {
        self.objects.lock().push(full_path.into());
        self
    }

    /// Add several objects.
    pub fn with_objects<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.objects
            .lock()
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Make resolution of every object with this filename fail.
    pub fn fail_resolution(&self, name: impl Into<String>) {
        self.failing.lock().insert(name.into());
    }

    /// Delay resolution of every object with this filename.
    pub fn delay_resolution(&self, name: impl Into<String>, delay: Duration) {
        self.delays.lock().insert(name.into(), delay);
    }

    /// Make listing fail with the given reason until cleared.
    pub fn fail_listing(&self, reason: impl Into<String>) {
        *self.listing_error.lock() = Some(reason.into());
    }

    /// Let listing succeed again.
    pub fn clear_listing_failure(&self) {
        *self.listing_error.lock() = None;
    }

    /// Number of `list_all` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `resolve` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    fn list_now(&self, path: &str) -> Result<Vec<Handle>, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.listing_error.lock().clone() {
            return Err(StorageError::Unavailable(reason));
        }

        let prefix = path.trim_start_matches('/');
        let handles: Vec<Handle> = self
            .objects
            .lock()
            .iter()
            .filter_map(|full| {
                let rest = full.strip_prefix(prefix)?;
                // Direct children only, like a delimiter listing.
                (!rest.is_empty() && !rest.contains('/')).then(|| Handle::new(full.clone()))
            })
            .collect();

        debug!(path, count = handles.len(), "Memory store listing");
        Ok(handles)
    }

    async fn resolve_now(&self, handle: &Handle) -> Result<ResolvedAddress, StorageError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().get(handle.name()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(handle.name()) {
            return Err(StorageError::Unavailable(format!(
                "scripted failure for {}",
                handle.name()
            )));
        }

        Ok(ResolvedAddress::new(format!(
            "{}/{}",
            self.base_url,
            handle.full_path()
        )))
    }
}

impl ObjectStore for MemoryStore {
    fn list_all<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<Handle>, StorageError>> {
        Box::pin(async move { self.list_now(path) })
    }

    fn resolve<'a>(
        &'a self,
        handle: &'a Handle,
    ) -> BoxFuture<'a, Result<ResolvedAddress, StorageError>> {
        Box::pin(self.resolve_now(handle))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
