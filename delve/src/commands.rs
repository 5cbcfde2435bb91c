use clap::{arg, command};
use delve_core::config::DEFAULT_CONFIG_PATH;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("delve")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("delve")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default crawl configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration file")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration file without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a site concurrently from a seed URL, reporting page titles until a \
                quota, the deadline or an interrupt ends the run.",
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to a JSON config file (default: ~/.config/delve/config.json)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The seed URL to crawl")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Depth budget of the seed; links are followed while it stays above zero")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"max-results" <NUM>)
                        .required(false)
                        .help("Stop after this many pages")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-errors" <NUM>)
                        .required(false)
                        .help("Stop after this many failed fetches")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"app-timeout" <SECONDS>)
                        .required(false)
                        .help("Deadline for the whole crawl in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"lenient")
                        .required(false)
                        .help("Keep running after the site is exhausted until the deadline or an interrupt")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print results as JSON lines and the summary as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
