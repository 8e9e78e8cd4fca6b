use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::models::Post;
use crate::organizer::Projection;

/// Memoized [`Projection`] of the post collection.
///
/// Writers bump the revision through [`ProjectionCache::invalidate`]; readers
/// rebuild only when the revision they observe differs from the cached one.
#[derive(Default)]
pub struct ProjectionCache {
    revision: AtomicU64,
    slot: Mutex<Option<(u64, Arc<Projection>)>>,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn invalidate(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Cached projection for the current revision, or a fresh one built from `load`.
    ///
    /// The slot lock is held only to read or swap the cached value; `load` and the
    /// build run unlocked, so concurrent misses may each build once.
    pub fn get_or_try_compute<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<Post>, E>,
    ) -> Result<Arc<Projection>, E> {
        // Read the revision before loading so a concurrent write forces a rebuild next time.
        let revision = self.revision();
        if let Some((cached_revision, projection)) = self.lock_slot().as_ref() {
            if *cached_revision == revision {
                return Ok(Arc::clone(projection));
            }
        }

        let projection = Arc::new(Projection::build(load()?));
        tracing::debug!("Rebuilt post projection at revision {}", revision);

        let mut slot = self.lock_slot();
        let newer_cached = matches!(slot.as_ref(), Some((cached, _)) if *cached > revision);
        if !newer_cached {
            *slot = Some((revision, Arc::clone(&projection)));
        }
        Ok(projection)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<(u64, Arc<Projection>)>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
