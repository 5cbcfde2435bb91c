pub mod commands;
pub mod handlers;
pub mod signals;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{apply_overrides, format_result_line, resolve_config, write_default_config};

// Re-export crawl functionality from delve-core
pub use delve_core::crawl::{
    CrawlOptions, CrawlSummary, execute_crawl, extract_url_path, generate_crawl_report,
};
