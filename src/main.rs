use clap::{Parser, Subcommand};
use colored::Colorize;
use fivetran_fetch::{
    apis::ApiStats,
    config::{load_config_from_path, CONFIG_FILE_PATH},
    logger::{self, LogLevel, LogTag},
    CancellationToken, FetchCoordinator, FetchResult,
};
use futures::future::join_all;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fivetran-fetch")]
#[command(
    about = "Rate-limit aware, cached GET client for the Fivetran REST API",
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Maximum concurrent requests (0 = unbounded); overrides the config file
    #[arg(long)]
    max_concurrent: Option<u16>,

    /// Only show warnings and errors
    #[arg(long)]
    quiet: bool,

    /// Minimum log level (error, warning, info, debug)
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one or more URLs concurrently (absolute, or relative to the API base)
    Get {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Print the request statistics as JSON instead of a table
        #[arg(long)]
        stats_json: bool,
    },
}

/// Entry point
///
/// `--debug-<tag>` flags are read by the logger straight from the process
/// arguments, so they are stripped before clap sees them.
#[tokio::main]
async fn main() {
    logger::init();

    let cli = Cli::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    if cli.quiet || cli.log_level.is_some() {
        let mut log_config = logger::get_logger_config();
        if cli.quiet {
            log_config.min_level = LogLevel::Warning;
        }
        if let Some(level) = cli.log_level {
            log_config.min_level = level;
        }
        logger::set_logger_config(log_config);
    }

    let code = match run(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            logger::error(LogTag::Config, &e.to_string());
            1
        }
    };

    std::process::exit(code);
}

/// Returns whether every fetch succeeded
async fn run(cli: Cli) -> FetchResult<bool> {
    let mut config = load_config_from_path(&cli.config)?;
    if let Some(max_concurrent) = cli.max_concurrent {
        config.fetch.max_concurrent_requests = max_concurrent;
    }
    config.validate()?;

    let coordinator = FetchCoordinator::from_config(&config)?;
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                logger::warning(
                    LogTag::System,
                    "Ctrl-C received, cancelling outstanding requests",
                );
                cancel.cancel();
            }
        });
    }

    let Command::Get { urls, stats_json } = cli.command;

    logger::info(
        LogTag::System,
        &format!(
            "Fetching {} URL(s), max concurrent: {}",
            urls.len(),
            match config.fetch.max_concurrent_requests {
                0 => "unbounded".to_string(),
                n => n.to_string(),
            }
        ),
    );

    let results = join_all(urls.iter().map(|url| coordinator.fetch(url, &cancel))).await;

    let mut all_ok = true;
    for (url, result) in urls.iter().zip(results) {
        println!("{}", "=".repeat(80));
        match result {
            Ok(response) => {
                println!("{} {}", response.status.to_string().green(), url);
                println!("{}", response.text());
            }
            Err(e) => {
                all_ok = false;
                println!("{} {}", "FAILED".red(), url);
                println!("{}", e);
            }
        }
    }
    println!("{}", "=".repeat(80));

    let stats = coordinator.get_stats();
    if stats_json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => logger::error(LogTag::System, &format!("Failed to encode stats: {}", e)),
        }
    } else {
        print_stats(&stats);
    }

    Ok(all_ok)
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level '{}'", value))
}

fn print_stats(stats: &ApiStats) {
    println!("\n[API STATS]");
    println!("Total Requests: {}", stats.total_requests);
    println!("Successful: {}", stats.successful_requests);
    println!("Failed: {}", stats.failed_requests);
    println!("Rate Limited (429): {}", stats.rate_limited_responses);
    println!("Cache Hits: {}", stats.cache_hits);
    println!("Cache Misses: {}", stats.cache_misses);
    println!("Avg Response Time: {:.2}ms", stats.average_response_time_ms);
    if let Some(error) = &stats.last_error {
        println!("Last Error: {}", error);
    }
}
