use crate::error::ScanError;

pub const DONE_MESSAGE: &str = "all urls already scanned";

/// One message on the engine's result stream.
#[derive(Debug)]
pub enum CrawlResult {
    /// A page was fetched and parsed.
    Page { url: String, title: String },
    /// Fetching or parsing `url` failed. Non-fatal to the rest of the crawl.
    Failure { url: String, error: ScanError },
    /// Every reachable, in-budget URL has been visited and the crawl was not
    /// cancelled. Emitted at most once per crawl.
    Done { message: String },
}

impl CrawlResult {
    pub fn page(url: impl Into<String>, title: impl Into<String>) -> Self {
        CrawlResult::Page {
            url: url.into(),
            title: title.into(),
        }
    }

    pub fn failure(url: impl Into<String>, error: ScanError) -> Self {
        CrawlResult::Failure {
            url: url.into(),
            error,
        }
    }

    pub fn done() -> Self {
        CrawlResult::Done {
            message: DONE_MESSAGE.to_string(),
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, CrawlResult::Page { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CrawlResult::Failure { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, CrawlResult::Done { .. })
    }

    /// The URL this result is about, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            CrawlResult::Page { url, .. } | CrawlResult::Failure { url, .. } => Some(url),
            CrawlResult::Done { .. } => None,
        }
    }
}
