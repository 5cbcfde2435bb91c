pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod page;
pub mod result;
pub mod visited;
pub mod work;

pub use crawler::Crawler;
pub use error::ScanError;
pub use fetcher::{Fetcher, HttpFetcher};
pub use page::{HtmlPage, Page};
pub use result::CrawlResult;
pub use visited::VisitedSet;
pub use work::{WorkCounter, WorkGuard};

pub use tokio_util::sync::CancellationToken;
