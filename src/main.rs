use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};
use wordtally::config::{load_config, OutputFormat, ReduceStrategy, RunConfig};
use wordtally::mapreduce::{Coordinator, PipelineObserver, PipelineState, RunReport};
use wordtally::source::LocationSource;
use wordtally::visualize::visualizer_for;
use wordtally::error::describe_error_code;
use wordtally::WordTallyError;

/// Count word frequencies with a concurrent map-reduce pipeline
#[derive(Parser)]
#[command(name = "wordtally", version)]
#[command(about = "Rank the most frequent words of a document", long_about = None)]
struct Cli {
    /// URL, file path, or `-` for stdin
    location: String,

    /// Number of concurrent map workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of ranked words to show
    #[arg(short = 'n', long = "top")]
    top: Option<usize>,

    /// Count tokens made only of digits
    #[arg(long)]
    keep_numeric: bool,

    /// Abort the whole run when any chunk fails
    #[arg(long)]
    fail_fast: bool,

    /// Overall deadline in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// When chunk counts are merged
    #[arg(long, value_enum)]
    strategy: Option<ReduceStrategy>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }
        if self.keep_numeric {
            config.keep_numeric = true;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = Some(timeout);
        }
        if let Some(strategy) = self.strategy {
            config.reduce_strategy = strategy;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
    }
}

/// Progress bar over map workers, drawn on stderr
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░ "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl PipelineObserver for ProgressObserver {
    fn on_transition(&self, _from: PipelineState, to: PipelineState) {
        if to.is_terminal() {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_message(to.to_string());
        }
    }

    fn on_chunks_planned(&self, chunk_count: usize) {
        self.bar.set_length(chunk_count as u64);
    }

    fn on_chunk_finished(&self, _chunk_index: usize, _succeeded: bool) {
        self.bar.inc(1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 2)
        .init();

    debug!("wordtally started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        let code = match e.downcast_ref::<WordTallyError>() {
            Some(err) => {
                eprintln!("  {}", describe_error_code(err.code()));
                err.exit_code()
            }
            None => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let source = LocationSource::new(config.http_timeout())?;
    let format = config.output_format;
    let mut coordinator =
        Coordinator::new(config, Arc::new(source)).with_observer(Arc::new(ProgressObserver::new()));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let report = coordinator.run_with_cancel(&cli.location, cancel).await?;
    warn_if_partial(&report);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    visualizer_for(format).render_report(&report, &mut out)?;
    out.flush()?;
    Ok(())
}

fn warn_if_partial(report: &RunReport) {
    if !report.partial {
        return;
    }
    eprintln!(
        "Warning: partial result, {} of {} chunks dropped:",
        report.failures.len(),
        report.chunk_count
    );
    for failure in &report.failures {
        eprintln!("  {}", WordTallyError::worker_failure(failure.clone()));
    }
}
