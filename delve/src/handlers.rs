use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use delve_core::config::{CrawlConfig, default_config_path, expand_path, load_config};
use delve_core::control::StopReason;
use delve_core::crawl::{
    CrawlOptions, CrawlSummary, execute_crawl, generate_crawl_report, result_json,
};
use delve_core::sink::ResultObserver;
use delve_scanner::{CrawlResult, HttpFetcher};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::signals::spawn_signal_listener;

/// Seed written into freshly initialised config files.
pub const TEMPLATE_SEED_URL: &str = "https://example.com/";

pub fn print_banner() {
    println!(
        "{} {}",
        "delve".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!("{}", "depth-bounded concurrent web crawler".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

// Helper functions for crawl handler

/// Apply command line flags on top of values loaded from file.
pub fn apply_overrides(config: &mut CrawlConfig, args: &ArgMatches) {
    if let Some(url) = args.get_one::<Url>("url") {
        config.url = url.as_str().to_string();
    }
    if let Some(depth) = args.get_one::<i64>("max-depth") {
        config.max_depth = *depth;
    }
    if let Some(max_results) = args.get_one::<usize>("max-results") {
        config.max_results = *max_results;
    }
    if let Some(max_errors) = args.get_one::<usize>("max-errors") {
        config.max_errors = *max_errors;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.request_timeout = *timeout;
    }
    if let Some(app_timeout) = args.get_one::<u64>("app-timeout") {
        config.app_timeout = *app_timeout;
    }
    if args.get_flag("lenient") {
        config.cancel_on_done = false;
    }
}

/// Load the config file (explicit `--config` or the default location), apply
/// flag overrides and validate. A missing file is fine when `--url` is given.
pub fn resolve_config(args: &ArgMatches) -> Result<CrawlConfig> {
    let path = args
        .get_one::<PathBuf>("config")
        .map(|p| expand_path(&p.to_string_lossy()))
        .unwrap_or_else(default_config_path);

    let mut config = if path.exists() {
        load_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else if args.get_one::<Url>("url").is_some() {
        debug!("No config file at {}, using defaults", path.display());
        CrawlConfig::default()
    } else {
        bail!(
            "No config file at {} and no --url given (run `delve init` to create one)",
            path.display()
        );
    };

    apply_overrides(&mut config, args);
    config.validate().context("Invalid crawl configuration")?;
    Ok(config)
}

/// One result as a terminal line.
pub fn format_result_line(result: &CrawlResult) -> String {
    match result {
        CrawlResult::Page { url, title } => {
            let title = if title.is_empty() {
                "(untitled)".bright_black().to_string()
            } else {
                title.bright_white().to_string()
            };
            format!("{} {} {}", "✓".green().bold(), url, title)
        }
        CrawlResult::Failure { url, error } => {
            format!("{} {} {}", "✗".red().bold(), url, error.to_string().yellow())
        }
        CrawlResult::Done { message } => format!("{} {}", "→".blue().bold(), message),
    }
}

fn stop_reason_line(summary: &CrawlSummary) -> String {
    let reason = summary.stop_reason.to_string();
    let reason = match summary.stop_reason {
        StopReason::Exhausted | StopReason::ResultQuota => reason.green().bold(),
        StopReason::ErrorQuota => reason.red().bold(),
        _ => reason.yellow().bold(),
    };
    format!(
        "Crawl stopped: {} ({} pages, {} errors in {:.2}s)",
        reason,
        summary.pages.len(),
        summary.failures.len(),
        summary.elapsed.as_secs_f64()
    )
}

fn init_logging(config: &CrawlConfig) {
    if let Err(e) = tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

fn build_spinner(quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting crawl...");
    Ok(Some(pb))
}

fn build_observer(spinner: Option<ProgressBar>, json: bool) -> ResultObserver {
    let pages = AtomicUsize::new(0);
    let errors = AtomicUsize::new(0);

    Arc::new(move |result: &CrawlResult| {
        match result {
            CrawlResult::Page { .. } => {
                pages.fetch_add(1, Ordering::Relaxed);
            }
            CrawlResult::Failure { .. } => {
                errors.fetch_add(1, Ordering::Relaxed);
            }
            CrawlResult::Done { .. } => {}
        }

        let line = if json {
            result_json(result).to_string()
        } else {
            format_result_line(result)
        };

        match spinner {
            Some(ref pb) => {
                pb.println(line);
                pb.set_message(format!(
                    "Crawling... {} pages, {} errors",
                    pages.load(Ordering::Relaxed),
                    errors.load(Ordering::Relaxed)
                ));
            }
            None => println!("{}", line),
        }
    })
}

/// Write the report to `output`, or print it when no path is given.
pub fn write_report(report: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = resolve_config(args)?;
    init_logging(&config);
    info!(pid = std::process::id(), "Starting delve");

    let json = args.get_flag("json");
    let output = args.get_one::<PathBuf>("output");

    let fetcher = HttpFetcher::with_timeout(config.request_timeout())
        .context("Failed to build HTTP client")?;
    let signals = spawn_signal_listener().context("Failed to install signal handlers")?;

    if !quiet && !json {
        println!(
            "{} {} {}",
            "Crawling".bright_white().bold(),
            config.url.bright_cyan(),
            format!(
                "(depth {}, {} results, {} errors, {}s)",
                config.max_depth, config.max_results, config.max_errors, config.app_timeout
            )
            .bright_black()
        );
    }

    let spinner = build_spinner(quiet || json)?;
    let observer = build_observer(spinner.clone(), json);

    let summary = execute_crawl(
        CrawlOptions::from_config(&config),
        Arc::new(fetcher),
        signals,
        Some(observer),
    )
    .await
    .context("Crawl failed")?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = if json {
        serde_json::to_string_pretty(&summary)?
    } else {
        println!("\n{}\n", stop_reason_line(&summary));
        generate_crawl_report(&summary)
    };
    write_report(&report, output)
}

/// Serialise the default config, seeded with a placeholder URL, to `path`.
pub fn write_default_config(path: &Path) -> Result<CrawlConfig> {
    let config = CrawlConfig {
        url: TEMPLATE_SEED_URL.to_string(),
        ..CrawlConfig::default()
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, config.to_json_pretty()?)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(config)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  DELVE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let path = match args.get_one::<String>("PATH") {
        Some(path) => expand_path(path),
        None => default_config_path(),
    };
    let force = args.get_flag("force");

    println!(
        "{} Target: {}",
        "→".blue(),
        path.display().to_string().bright_white()
    );
    println!();

    if path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A configuration file already exists at this location.");
        println!();

        let response = print_prompt("Overwrite it? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let config = write_default_config(&path)?;

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config: {}",
        "✓".green().bold(),
        path.display().to_string().bright_white()
    );
    println!(
        "{} Seed URL: {} (edit before crawling)",
        "ℹ".blue(),
        config.url.bright_white()
    );
    println!();
    Ok(())
}
