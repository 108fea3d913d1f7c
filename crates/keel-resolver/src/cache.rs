//! A caching, deduplicating wrapper around a `Source`

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use keel_semver::Version;

use crate::source::{PackageVersion, Source, SourceError};

/// A catalog error shared between every caller that waited on the same
/// fetch. Displays and sources as the original error.
#[derive(Debug, Clone)]
pub struct SharedSourceError(Arc<SourceError>);

impl fmt::Display for SharedSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SharedSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref().as_ref())
    }
}

enum CacheSlot {
    /// A fetch is in flight; wait for the condvar
    Pending,
    Ready(Result<Vec<PackageVersion>, Arc<SourceError>>),
}

struct CacheState {
    slots: Mutex<HashMap<String, CacheSlot>>,
    ready: Condvar,
}

/// Caches `get_package_versions` results and guarantees at most one
/// upstream fetch per package: concurrent requesters for the same key block
/// until the first fetch completes and then all observe the same result.
///
/// `prefetch` warms the cache from background threads, so requests fired
/// for packages the solver has not reached yet deduplicate here.
pub struct CachingSource<S> {
    inner: Arc<S>,
    state: Arc<CacheState>,
}

impl<S> Clone for CachingSource<S> {
    fn clone(&self) -> Self {
        CachingSource {
            inner: Arc::clone(&self.inner),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S> CachingSource<S> {
    pub fn new(inner: S) -> CachingSource<S> {
        CachingSource {
            inner: Arc::new(inner),
            state: Arc::new(CacheState {
                slots: Mutex::new(HashMap::new()),
                ready: Condvar::new(),
            }),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, CacheSlot>> {
        // A poisoned lock only means another requester panicked mid-fetch;
        // the map itself is still coherent
        self.state
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn share(result: &Result<Vec<PackageVersion>, Arc<SourceError>>) -> Result<Vec<PackageVersion>, SourceError> {
        match result {
            Ok(versions) => Ok(versions.clone()),
            Err(error) => Err(Box::new(SharedSourceError(Arc::clone(error)))),
        }
    }
}

impl<S: Source + Send + Sync + 'static> Source for CachingSource<S> {
    fn get_package_versions(&self, package: &str) -> Result<Vec<PackageVersion>, SourceError> {
        let mut slots = self.lock_slots();
        loop {
            match slots.get(package) {
                None => break,
                Some(CacheSlot::Pending) => {
                    slots = self
                        .state
                        .ready
                        .wait(slots)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                Some(CacheSlot::Ready(result)) => return Self::share(result),
            }
        }

        // First requester for this package: fetch without holding the lock
        slots.insert(package.to_string(), CacheSlot::Pending);
        drop(slots);

        let fetched = self
            .inner
            .get_package_versions(package)
            .map_err(Arc::new);

        let mut slots = self.lock_slots();
        let shared = Self::share(&fetched);
        slots.insert(package.to_string(), CacheSlot::Ready(fetched));
        drop(slots);
        self.state.ready.notify_all();

        shared
    }

    fn pick_version(&self, package: &str, candidates: &[Version]) -> Version {
        self.inner.pick_version(package, candidates)
    }

    fn prefetch(&self, packages: &[String]) {
        for package in packages {
            let this = self.clone();
            let package = package.clone();
            thread::spawn(move || {
                let _ = this.get_package_versions(&package);
            });
        }
    }
}
