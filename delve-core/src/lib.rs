pub mod config;
pub mod control;
pub mod crawl;
pub mod sink;

pub use config::{ConfigError, CrawlConfig};
pub use control::{ControlLoop, ControlSignal, StopReason};
pub use crawl::{CrawlOptions, CrawlSummary, execute_crawl, generate_crawl_report};
pub use sink::{DonePolicy, QuotaPolicy, ResultObserver, SinkOutcome, consume_results};
