use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use keyscout::{
    CoordinatorConfig, CoordinatorStats, Executor, SearchCoordinator, SearchError, SearchObserver,
};
use std::{num::NonZeroUsize, path::PathBuf, thread, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod corpus;
mod script;

use corpus::CorpusExecutor;
use script::Step;

/// How long to wait for the last search once the script has run out
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct ReplayArgs {
    /// File with one searchable entry per line
    #[arg(short = 'c', long)]
    corpus: PathBuf,

    /// Typing session to replay (type <text> | enter <text> | wait <ms> | reset)
    #[arg(short = 's', long)]
    script: PathBuf,

    /// Maximum number of results per search
    #[arg(short = 'm', long)]
    max_results: Option<usize>,

    /// Simulated latency of every search, in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    latency_ms: u64,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print coordinator statistics after the session
    #[arg(long)]
    stats: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted typing session against a corpus
    Replay(Box<ReplayArgs>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay(args) => replay(*args),
    }
}

fn replay(args: ReplayArgs) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = CoordinatorConfig::load_from(args.config.as_deref())?.merge_with_cli(
        args.threads,
        args.log_level.clone(),
        args.max_results,
    );
    config.validate()?;
    init_logging(&config.log_level);

    let steps = script::load(&args.script)?;
    let executor = CorpusExecutor::load(&args.corpus, Duration::from_millis(args.latency_ms))
        .with_context(|| format!("failed to read corpus {}", args.corpus.display()))?;
    info!(
        "Replaying {} steps against {} entries",
        steps.len(),
        executor.entry_count()
    );

    let coordinator = SearchCoordinator::new(Executor::new(executor), ConsoleObserver, &config)?;

    for step in steps {
        match step {
            Step::Type(text) => coordinator.notify_input(text, config.max_results)?,
            Step::Enter(text) => coordinator.trigger_immediate(text, config.max_results)?,
            Step::Wait(delay) => thread::sleep(delay),
            Step::Reset => coordinator.reset(),
        }
    }

    if !coordinator.wait_idle(IDLE_TIMEOUT) {
        warn!("Gave up waiting for the last search after {:?}", IDLE_TIMEOUT);
    }
    coordinator.shutdown();

    if args.stats {
        print_stats(&coordinator.metrics().get_stats());
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints every delivered search to stdout
struct ConsoleObserver;

impl SearchObserver<String> for ConsoleObserver {
    fn display_results(&self, results: &[String], more_available: bool) {
        for entry in results {
            println!("  {}", entry);
        }
        if more_available {
            println!("  {}", "(more results available)".yellow());
        }
    }

    fn search_complete(&self, query: &str, results: &[String], elapsed: Duration) {
        println!(
            "{} {:?}: {} results in {}",
            "Search".blue(),
            query,
            results.len(),
            format_elapsed(elapsed)
        );
    }

    fn search_failed(&self, query: &str, error: &SearchError, _elapsed: Duration) {
        eprintln!("{} {:?}: {}", "Search failed".red(), query, error);
    }
}

/// Formats a search time at microsecond precision
fn format_elapsed(elapsed: Duration) -> humantime::FormattedDuration {
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_micros(micros))
}

fn print_stats(stats: &CoordinatorStats) {
    println!("\n{}", "Coordinator stats".bold());
    println!("  notifications: {}", stats.notifications);
    println!("  immediate: {}", stats.immediate_triggers);
    println!("  resets: {}", stats.resets);
    println!(
        "  started: {} (superseded before start: {})",
        stats.started, stats.superseded_before_start
    );
    println!("  delivered: {}", stats.delivered.to_string().green());
    println!("  discarded: {}", stats.discarded);
    println!("  overflow threads: {}", stats.overflow_threads);
    println!("  failed: {}", stats.failed);
}
