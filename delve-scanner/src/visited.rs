use std::collections::HashSet;
use tokio::sync::Mutex;
use url::Url;

/// URLs already claimed by a traversal unit during one crawl.
///
/// Entries are never removed; the set lives as long as the crawl.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert under one lock acquisition. Returns `true` only for
    /// the first caller to claim the normalized form of `url`.
    pub async fn insert(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.urls.lock().await.insert(key)
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.urls.lock().await.contains(&normalize_url(url))
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.urls.lock().await.is_empty()
    }
}

/// Canonical key for the visited set: parsed and re-serialized by `url`
/// (lowercased scheme and host, default port dropped, empty path as `/`)
/// with the fragment removed. Unparseable input is used verbatim.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
