use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use leadsift_core::config::{
    ExternalExtractionConfig, FetchMode, MarketProfile, PipelineConfig, SnowballConfig,
};
use leadsift_core::email::{classify, normalize_email, validate_email, validate::is_junk_local};
use leadsift_core::model::{DomainRecord, EmailType};
use leadsift_core::pipeline::{DomainOutcome, Pipeline};
use leadsift_core::sink::{LEADS_FILE, ResultSink, RunSummary, SKIPPED_FILE, SUMMARY_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries the spinner and summary.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "leadsift=debug,leadsift_core=debug,leadsift_scanner=debug"
    } else if quiet {
        "leadsift=warn,leadsift_core=warn,leadsift_scanner=error"
    } else {
        "leadsift=info,leadsift_core=info,leadsift_scanner=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{} {}",
        "leadsift".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "crawl domains into ranked contact leads".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

// Input loading

/// Parse `--domain` values; unusable entries are skipped with a warning.
pub fn parse_domain_args(values: &[String]) -> Vec<DomainRecord> {
    values
        .iter()
        .filter_map(|value| {
            let record = DomainRecord::parse_line(value);
            if record.is_none() {
                warn!("Skipping invalid domain '{}'", value);
            }
            record
        })
        .collect()
}

/// Load domain records from a file of bare domains, URLs or JSON lines.
pub fn load_records_from_file(path: &Path) -> Result<Vec<DomainRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;

    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match DomainRecord::parse_line(trimmed) {
            Some(record) => records.push(record),
            None => warn!("Skipping invalid input line {}: '{}'", number + 1, trimmed),
        }
    }

    if records.is_empty() {
        bail!("No valid domains found in {}", path.display());
    }
    Ok(records)
}

/// Combine `--domain` values and an input file. At least one domain is required.
pub fn load_records_from_source(
    domains: &[String],
    input: Option<&PathBuf>,
) -> Result<Vec<DomainRecord>> {
    let mut records = parse_domain_args(domains);
    if let Some(path) = input {
        records.extend(load_records_from_file(path)?);
    }
    if records.is_empty() {
        bail!("No input domains: pass --domain or --input");
    }
    Ok(records)
}

// Configuration

fn value<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str, default: T) -> T {
    args.get_one::<T>(id).cloned().unwrap_or(default)
}

/// Build the pipeline configuration from `run` arguments.
pub fn config_from_matches(args: &ArgMatches) -> Result<PipelineConfig> {
    let defaults = PipelineConfig::default();

    let profile = match args.get_one::<PathBuf>("profile") {
        Some(path) => MarketProfile::load(path)
            .with_context(|| format!("Cannot use profile {}", path.display()))?,
        None => MarketProfile::default(),
    };

    let fetch_mode = match args.get_one::<String>("browser") {
        Some(endpoint) => FetchMode::Browser {
            endpoint: endpoint.clone(),
            token: args.get_one::<String>("browser-token").cloned(),
            delay_ms: value(args, "browser-delay", 1500),
        },
        None => FetchMode::Http,
    };

    let unrelated_keywords = args
        .get_many::<String>("unrelated")
        .map(|terms| {
            terms
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let config = PipelineConfig {
        domain_concurrency: value(args, "threads", defaults.domain_concurrency),
        page_concurrency: value(args, "page-threads", defaults.page_concurrency),
        max_pages_per_domain: value(args, "max-pages", defaults.max_pages_per_domain),
        timeout_secs: value(args, "timeout", defaults.timeout_secs),
        retries: value(args, "retries", defaults.retries),
        respect_robots: !args.get_flag("no-robots"),
        min_relevance: value(args, "min-score", defaults.min_relevance),
        max_emails_per_domain: value(args, "max-emails", defaults.max_emails_per_domain),
        unrelated_keywords,
        snowball: SnowballConfig {
            enabled: args.get_flag("snowball"),
            max_depth: value(args, "max-depth", defaults.snowball.max_depth),
            max_new_per_source: value(args, "max-new", defaults.snowball.max_new_per_source),
        },
        external: ExternalExtractionConfig {
            enabled: args.get_flag("ai"),
            model: value(args, "model", defaults.external.model.clone()),
            max_chars: value(args, "ai-max-chars", defaults.external.max_chars),
            api_key: args.get_one::<String>("openai-key").cloned(),
            ..defaults.external.clone()
        },
        fetch_mode,
        profile,
        ..defaults
    };

    config.validate()?;
    Ok(config)
}

// Handlers

pub async fn handle_run(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = config_from_matches(args)?;

    let domains: Vec<String> = args
        .get_many::<String>("domain")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let records = load_records_from_source(&domains, args.get_one::<PathBuf>("input"))?;

    let output = args
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or(crate::commands::DEFAULT_OUTPUT_DIR);
    let output_dir = PathBuf::from(shellexpand::tilde(output).as_ref());
    let sink = Arc::new(
        ResultSink::create(&output_dir)
            .with_context(|| format!("Cannot write to {}", output_dir.display()))?,
    );

    if !quiet {
        print_divider();
        println!("{}", "  LEADSIFT RUN".bright_white().bold());
        print_divider();
        println!("{} Domains: {}", "→".blue(), records.len().to_string().bright_white());
        println!(
            "{} Concurrency: {} domains, {} pages",
            "→".blue(),
            config.effective_domain_concurrency(),
            config.effective_page_concurrency()
        );
        println!(
            "{} Snowball: {}",
            "→".blue(),
            if config.snowball.enabled {
                format!("depth {}, {} per source", config.snowball.max_depth, config.snowball.max_new_per_source)
            } else {
                "off".to_string()
            }
        );
        println!("{} Output: {}", "→".blue(), output_dir.display().to_string().bright_white());
        println!();
    }

    let target = if quiet {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stdout()
    };
    let spinner = ProgressBar::with_draw_target(None, target);
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("starting");

    let processed = Arc::new(AtomicUsize::new(0));
    let bar = spinner.clone();
    let pipeline = Pipeline::from_config(config, sink)?.with_progress(Arc::new(
        move |domain: &str, outcome: &DomainOutcome| {
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            bar.set_message(format!("{} domains processed | {} {}", done, domain, outcome.label()));
        },
    ));

    info!("Processing {} input records", records.len());
    let summary = pipeline.run(records).await?;
    spinner.finish_and_clear();

    if !quiet {
        print_summary(&summary, &output_dir);
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary, output_dir: &Path) {
    println!();
    print_divider();
    println!("{}", "  SUMMARY".bright_white().bold());
    print_divider();
    println!(
        "{} Domains processed: {} ({} submitted, {} via snowball)",
        "✓".green().bold(),
        summary.domains_processed,
        summary.domains_submitted,
        summary.snowball_domains
    );
    println!(
        "  {} completed  {} skipped  {} failed",
        summary.domains_completed.to_string().green(),
        summary.domains_skipped.to_string().yellow(),
        summary.domains_failed.to_string().red()
    );
    println!(
        "{} Leads written: {} ({} emails found on {} pages)",
        "✓".green().bold(),
        summary.leads.to_string().bright_white().bold(),
        summary.emails_found,
        summary.pages_fetched
    );
    let limits = &summary.rate_limits;
    println!(
        "{} Requests: {}  retries: {}  HTTP 429: {}  failed fetches: {}  robots denied: {}",
        "→".blue(),
        limits.requests,
        limits.retries,
        limits.rate_limited,
        limits.failed_fetches,
        limits.robots_denied
    );
    println!("{} Duration: {:.1}s", "→".blue(), summary.duration_secs);
    println!();
    for file in [LEADS_FILE, SKIPPED_FILE, SUMMARY_FILE] {
        println!("  {}", output_dir.join(file).display().to_string().bright_white());
    }
}

/// Result of running one address through validation, the junk filter and
/// classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailVerdict {
    Invalid { normalized: String },
    Junk { email: String },
    Accepted { email: String, email_type: EmailType },
}

pub fn check_email(raw: &str) -> EmailVerdict {
    let Some(email) = validate_email(raw) else {
        return EmailVerdict::Invalid {
            normalized: normalize_email(raw),
        };
    };
    let local = email.split('@').next().unwrap_or("");
    if is_junk_local(local) {
        return EmailVerdict::Junk { email };
    }
    EmailVerdict::Accepted {
        email_type: classify(&email),
        email,
    }
}

pub fn handle_check(args: &ArgMatches) -> Result<()> {
    let addresses: Vec<&String> = args
        .get_many::<String>("EMAIL")
        .map(|v| v.collect())
        .unwrap_or_default();

    for raw in addresses {
        match check_email(raw) {
            EmailVerdict::Invalid { normalized } => {
                println!("{} {} invalid", "✗".red().bold(), normalized.bright_white());
            }
            EmailVerdict::Junk { email } => {
                println!("{} {} junk", "⚠".yellow().bold(), email.bright_white());
            }
            EmailVerdict::Accepted { email, email_type } => {
                println!("{} {} {}", "✓".green().bold(), email.bright_white(), email_type);
            }
        }
    }
    Ok(())
}
