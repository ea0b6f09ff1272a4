//! External-id to internal-UUID resolution cache.
//!
//! One cache per destination table per run. Lazily populated by a single
//! bulk read on first use, then extended with the id pairs each upsert
//! returns, so a record created earlier in the same run resolves without
//! another round trip. The snapshot is only meant to live for one run.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct IdCache {
    inner: HashMap<String, Uuid>,
    populated: bool,
}

impl IdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, external_id: &str) -> Option<Uuid> {
        self.inner.get(external_id).copied()
    }

    /// Run `loader`'s bulk read into the cache if this is the first use;
    /// later calls are no-ops so repopulating mid-run is impossible.
    pub async fn ensure_populated<F, Fut>(&mut self, loader: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(String, Uuid)>>>,
    {
        if self.populated {
            return Ok(());
        }
        let pairs = loader().await?;
        self.inner.extend(pairs);
        self.populated = true;
        Ok(())
    }

    /// Merge the `(external_id, id)` pairs returned by an upsert.
    pub fn extend(&mut self, pairs: &[(String, Uuid)]) {
        for (ext, id) in pairs {
            self.inner.insert(ext.clone(), *id);
        }
    }

    pub fn insert(&mut self, external_id: impl Into<String>, id: Uuid) {
        self.inner.insert(external_id.into(), id);
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Entries as (external_id, id), for building name indexes.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Uuid)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lazy_populate_runs_loader_once() {
        let mut cache = IdCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let id = Uuid::new_v4();

        for _ in 0..3 {
            let loads = loads.clone();
            cache
                .ensure_populated(|| {
                    let loads = loads.clone();
                    async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(vec![("team-1".to_string(), id)])
                    }
                })
                .await
                .unwrap();
            assert_eq!(cache.resolve("team-1"), Some(id));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extend_resolves_without_repopulate() {
        let mut cache = IdCache::new();
        cache
            .ensure_populated(|| async { Ok(Vec::new()) })
            .await
            .unwrap();
        assert!(cache.is_populated());
        assert_eq!(cache.resolve("new-team"), None);

        // Simulates the id pairs an upsert returns mid-run.
        let new_id = Uuid::new_v4();
        cache.extend(&[("new-team".to_string(), new_id)]);
        assert_eq!(cache.resolve("new-team"), Some(new_id));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_extend_overwrites_stale_entry() {
        let mut cache = IdCache::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        cache.insert("x", first);
        cache.extend(&[("x".to_string(), second)]);
        assert_eq!(cache.resolve("x"), Some(second));
    }
}
