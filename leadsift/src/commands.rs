use crate::CLAP_STYLING;
use clap::{arg, command};

pub const DEFAULT_OUTPUT_DIR: &str = "~/.local/share/leadsift/latest";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("leadsift")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("leadsift")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and summary output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log per-page detail")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Crawl candidate domains, extract and rank contact emails, and write leads \
                to the output directory.",
                )
                .arg(
                    arg!(-d --"domain" <DOMAIN>)
                        .required(false)
                        .help("A domain or URL to process (repeatable)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Newline-delimited domains/URLs or JSON-lines domain records")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory for leads.csv, skipped.log and run_summary.json")
                        .default_value(DEFAULT_OUTPUT_DIR),
                )
                .arg(
                    arg!(-t --"threads" <NUM_DOMAINS>)
                        .required(false)
                        .help("Domains processed concurrently")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"page-threads" <NUM_PAGES>)
                        .required(false)
                        .help("Pages fetched concurrently within one domain")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum pages fetched per domain, homepage included")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("15"),
                )
                .arg(
                    arg!(--"retries" <NUM>)
                        .required(false)
                        .help("Total attempts per page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"min-score" <SCORE>)
                        .required(false)
                        .help("Minimum relevance score for a domain to produce leads")
                        .value_parser(clap::value_parser!(i32))
                        .allow_negative_numbers(true)
                        .default_value("2"),
                )
                .arg(
                    arg!(--"max-emails" <NUM>)
                        .required(false)
                        .help("Maximum emails kept per domain")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"unrelated" <TERMS>)
                        .required(false)
                        .help("Comma-separated keywords that lower a domain's relevance")
                        .value_delimiter(','),
                )
                .arg(
                    arg!(--"snowball")
                        .required(false)
                        .help("Queue peer domains discovered in outbound links")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Snowball generations beyond the seeds")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"max-new" <NUM>)
                        .required(false)
                        .help("New domains accepted per snowball source")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"browser" <ENDPOINT>)
                        .required(false)
                        .help("Fetch pages through a headless browser service at this URL"),
                )
                .arg(
                    arg!(--"browser-token" <TOKEN>)
                        .required(false)
                        .help("Token for the browser service")
                        .env("BROWSERLESS_TOKEN")
                        .hide_env_values(true),
                )
                .arg(
                    arg!(--"browser-delay" <MS>)
                        .required(false)
                        .help("Delay between browser page loads in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1500"),
                )
                .arg(
                    arg!(--"ai")
                        .required(false)
                        .help("Also extract emails with a language model")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"model" <MODEL>)
                        .required(false)
                        .help("Model used for external extraction")
                        .default_value("gpt-4o-mini"),
                )
                .arg(
                    arg!(--"openai-key" <KEY>)
                        .required(false)
                        .help("API key for external extraction")
                        .env("OPENAI_API_KEY")
                        .hide_env_values(true),
                )
                .arg(
                    arg!(--"ai-max-chars" <NUM>)
                        .required(false)
                        .help("Characters of page text sent per request")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("6000"),
                )
                .arg(
                    arg!(--"profile" <PATH>)
                        .required(false)
                        .help("JSON market profile (relevance terms, excluded regions, snowball keywords)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-robots")
                        .required(false)
                        .help("Do not consult robots.txt")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("check")
                .about("Validate and classify email addresses the way a run would")
                .arg(
                    arg!(<EMAIL> ...)
                        .required(true)
                        .help("Addresses to check"),
                ),
        )
}
