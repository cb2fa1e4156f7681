use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Run-wide page cache keyed by absolute URL.
///
/// Each URL gets one cell; the first caller runs the fetch while later callers
/// for the same URL wait on it. A failed fetch leaves the cell empty so the URL
/// can be tried again, a robots denial is cached as `None`.
#[derive(Default)]
pub struct PageCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Option<String>>>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(url.to_string()).or_default().clone()
        };
        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Cached body for `url`, if a fetch for it already completed.
    pub async fn get(&self, url: &str) -> Option<Option<String>> {
        let entries = self.entries.lock().await;
        entries.get(url).and_then(|cell| cell.get().cloned())
    }

    /// Number of URLs with a completed fetch.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = Arc::new(PageCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("https://example.com/", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Some("<html/>".to_string()))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().as_deref(), Some("<html/>"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = PageCache::new();
        let first = cache
            .get_or_fetch("https://example.com/x", || async {
                Err(ScanError::Browser("boom".to_string()))
            })
            .await;
        assert!(first.is_err());
        assert!(cache.is_empty().await);

        let second = cache
            .get_or_fetch("https://example.com/x", || async { Ok(Some("ok".to_string())) })
            .await
            .unwrap();
        assert_eq!(second.as_deref(), Some("ok"));
        assert_eq!(cache.get("https://example.com/x").await, Some(Some("ok".to_string())));
    }
}
