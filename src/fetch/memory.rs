//! In-memory content source.

use super::{ContentSource, FetchError};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Entry {
    Page(String),
    Status(u16),
}

/// Serves documents from a map and counts every request.
///
/// Useful when pages are prerendered or embedded, and as the source behind
/// engine tests. Unknown paths answer 404. An optional latency makes each
/// request suspend, which keeps concurrent callers genuinely interleaved.
///
/// # Example
///
/// ```ignore
/// let source = MemorySource::new()
///     .with_page("/about", "<div id=\"sections\">hi</div>")
///     .with_status("/gone", 410);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Arc<Mutex<FxHashMap<String, Entry>>>,
    requests: Arc<AtomicUsize>,
    per_path: Arc<Mutex<FxHashMap<String, usize>>>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, path: &str, body: &str) -> Self {
        self.entries
            .lock()
            .insert(path.to_owned(), Entry::Page(body.to_owned()));
        self
    }

    pub fn with_status(self, path: &str, status: u16) -> Self {
        self.entries
            .lock()
            .insert(path.to_owned(), Entry::Status(status));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Total requests served.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Requests served for one path.
    pub fn requests_for(&self, path: &str) -> usize {
        self.per_path.lock().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn get(&self, path: &str) -> Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.per_path.lock().entry(path.to_owned()).or_default() += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let entry = self.entries.lock().get(path).cloned();
        match entry {
            Some(Entry::Page(body)) => Ok(body),
            Some(Entry::Status(status)) => Err(FetchError::Status {
                path: path.to_owned(),
                status,
            }),
            None => Err(FetchError::Status {
                path: path.to_owned(),
                status: 404,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_counts_requests() {
        let source = MemorySource::new().with_page("/a", "A");

        assert_eq!(source.get("/a").await.unwrap(), "A");
        assert!(source.get("/b").await.is_err());
        assert!(source.get("/a").await.is_ok());

        assert_eq!(source.requests(), 3);
        assert_eq!(source.requests_for("/a"), 2);
        assert_eq!(source.requests_for("/b"), 1);
    }

    #[tokio::test]
    async fn test_memory_source_status() {
        let source = MemorySource::new().with_status("/gone", 410);
        let err = source.get("/gone").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 410, .. }));
    }
}
