use clap::Parser;
use fivetran_fetch::apis::testing::{ok, too_many_requests, ScriptedTransport, Step};
use fivetran_fetch::apis::FetchCoordinator;
use fivetran_fetch::config::{load_config_from_path, FetchConfig, CONFIG_FILE_PATH};
use fivetran_fetch::logger::{self, LogTag};
use fivetran_fetch::CancellationToken;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "debug_fetch")]
#[command(about = "Debug tool for the fetch coordinator", long_about = None)]
struct Args {
    /// URL to fetch (absolute, or relative to the API base)
    #[arg(default_value = "groups")]
    url: String,

    /// How many times to fetch the URL
    #[arg(short, long, default_value = "3")]
    repeat: usize,

    /// Maximum concurrent requests (0 = unbounded)
    #[arg(short, long)]
    max_concurrent: Option<u16>,

    /// Path to the TOML configuration file
    #[arg(long, default_value = CONFIG_FILE_PATH)]
    config: String,

    /// Show fetch and cache debug lines
    #[arg(short, long)]
    verbose: bool,

    /// Use a scripted transport (one 429 with Retry-After: 2, then 200) instead of the API
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));
    if args.verbose {
        logger::set_debug_tags(&[LogTag::Fetch, LogTag::Cache]);
    }

    println!("Fetch Coordinator Debug Tool\n");
    println!("{}", "=".repeat(80));

    let coordinator = if args.offline {
        let fetch_config = FetchConfig {
            max_concurrent_requests: args.max_concurrent.unwrap_or(0),
            ..FetchConfig::default()
        };
        let transport = ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("2")))],
            Step::Delay(Duration::from_millis(150), ok(r#"{"code":"Success"}"#)),
        );
        FetchCoordinator::new(Arc::new(transport), &fetch_config)
    } else {
        let mut config = load_config_from_path(&args.config)?;
        if let Some(max_concurrent) = args.max_concurrent {
            config.fetch.max_concurrent_requests = max_concurrent;
        }
        FetchCoordinator::from_config(&config)?
    };

    logger::info(
        LogTag::System,
        &format!("Fetching '{}' {} times", args.url, args.repeat),
    );

    let cancel = CancellationToken::new();
    for i in 0..args.repeat {
        let start = Instant::now();
        match coordinator.fetch(&args.url, &cancel).await {
            Ok(response) => println!(
                "[{}] {} ({} bytes) in {}ms",
                i + 1,
                response.status,
                response.body.len(),
                start.elapsed().as_millis()
            ),
            Err(e) => println!("[{}] Failed: {}", i + 1, e),
        }
    }

    // Print stats
    println!("\n{}", "=".repeat(80));
    let stats = coordinator.get_stats();
    println!("\n[API STATS]");
    println!("Total Requests: {}", stats.total_requests);
    println!("Successful: {}", stats.successful_requests);
    println!("Failed: {}", stats.failed_requests);
    println!("Rate Limited (429): {}", stats.rate_limited_responses);
    println!("Cache Hits: {}", stats.cache_hits);
    println!("Cache Misses: {}", stats.cache_misses);
    println!("Avg Response Time: {:.2}ms", stats.average_response_time_ms);

    let metrics = coordinator.cache().metrics();
    println!("\n[CACHE]");
    println!("Entries: {}", coordinator.cache().len());
    println!("Hit Rate: {:.1}%", metrics.hit_rate() * 100.0);

    println!("\n{}", "=".repeat(80));
    println!("\nTest completed!");

    Ok(())
}
