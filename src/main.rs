//! LogMonster: find the processes and services behind runaway log growth.
//!
//! Thin binary entry point. All logic lives in the `logmonster-core` crate.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use logmonster_core::analysis;
use logmonster_core::attribution::ProcessAttributor;
use logmonster_core::model::size::{format_count, format_rate, format_size, format_size_signed};
use logmonster_core::model::FileGrowth;
use logmonster_core::scanner::{ScanConfig, Scanner, SnapshotStore};
use logmonster_core::service::ServiceResolver;
use logmonster_core::termination::{KillOutcome, Signal, TerminationController, TerminationPolicy};
use logmonster_core::CancelToken;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(name = "logmonster")]
#[clap(about = "Find the processes and services behind runaway log growth", version)]
#[clap(arg_required_else_help(true))]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct WalkArgs {
    /// Directory or file to scan; repeatable. Defaults to /var/log and /tmp.
    #[clap(long = "path", short = 'p')]
    paths: Vec<PathBuf>,

    /// Stat workers; 0 means one per CPU.
    #[clap(long)]
    workers: Option<usize>,

    /// Maximum directory depth; 0 means unlimited.
    #[clap(long)]
    depth: Option<usize>,

    /// Base-name glob to skip; repeatable. Replaces the default archive globs.
    #[clap(long = "exclude", short = 'x')]
    excludes: Vec<String>,

    #[clap(long)]
    follow_symlinks: bool,
}

impl WalkArgs {
    fn config(&self) -> ScanConfig {
        let mut config = ScanConfig::default();
        if !self.paths.is_empty() {
            config.paths = self.paths.clone();
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(depth) = self.depth {
            config.max_depth = depth;
        }
        if !self.excludes.is_empty() {
            config.exclude_patterns = self.excludes.clone();
        }
        config.follow_symlinks = self.follow_symlinks;
        config
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take two snapshots and report files that grew in between
    Scan {
        #[clap(flatten)]
        walk: WalkArgs,

        /// Seconds between the two snapshots.
        #[clap(long, short, default_value_t = 5.0)]
        interval: f64,

        /// Minimum growth to report, in MiB.
        #[clap(long, short, default_value_t = 10.0)]
        threshold_mb: f64,

        /// Also show which processes and services hold each growing file.
        #[clap(long, short)]
        attribute: bool,

        /// Save the second snapshot as a JSON baseline.
        #[clap(long)]
        save: Option<PathBuf>,
    },

    /// Save a single snapshot as a JSON baseline
    Snapshot {
        #[clap(flatten)]
        walk: WalkArgs,

        /// Output file.
        output: PathBuf,
    },

    /// Compare a saved baseline with a fresh snapshot
    Compare {
        /// Baseline written by `snapshot` or `scan --save`.
        baseline: PathBuf,

        #[clap(flatten)]
        walk: WalkArgs,

        /// Minimum growth to report, in MiB.
        #[clap(long, short, default_value_t = 10.0)]
        threshold_mb: f64,
    },

    /// Show the processes and services holding a file open
    Who { file: PathBuf },

    /// Terminate a process: SIGTERM, then SIGKILL after a timeout
    Kill {
        pid: u32,

        /// Seconds to wait after SIGTERM before SIGKILL.
        #[clap(long, short, default_value_t = 5.0)]
        timeout: f64,
    },

    /// Send a single signal, e.g. `hup` to make a daemon reopen its logs
    Signal { pid: u32, signal: String },
}

fn parse_signal(name: &str) -> Result<Signal> {
    let signal = match name.to_ascii_lowercase().trim_start_matches("sig") {
        "hup" => Signal::Hangup,
        "int" => Signal::Interrupt,
        "quit" => Signal::Quit,
        "term" => Signal::Term,
        "kill" => Signal::Kill,
        "usr1" => Signal::User1,
        "usr2" => Signal::User2,
        "stop" => Signal::Stop,
        "cont" => Signal::Continue,
        other => bail!("unsupported signal '{other}'"),
    };
    Ok(signal)
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {what}: {value}"))
}

fn print_growth(growth: &[FileGrowth]) {
    if growth.is_empty() {
        println!("No files grew past the threshold.");
        return;
    }
    println!("{:<8} {:>12} {:>14}  FILE", "SEVERITY", "GROWTH", "RATE");
    for g in growth {
        println!(
            "{:<8} {:>12} {:>14}  {}",
            g.severity().label(),
            format_size(g.growth_bytes),
            format_rate(g.growth_rate),
            g.path.display()
        );
    }
}

fn print_holders(attributor: &ProcessAttributor, resolver: &ServiceResolver, file: &Path) {
    match attributor.find_process_for_file(file) {
        Ok(processes) => {
            for p in processes {
                let service = match resolver.resolve_service(p.pid) {
                    Ok(s) => format!("{} [{}]", s.unit, s.status),
                    Err(_) => "-".to_string(),
                };
                println!(
                    "    pid {:<7} {:<16} user={:<10} rss={:<10} wrote={:<10} service={}",
                    p.pid,
                    p.name,
                    p.user,
                    format_size((p.memory_mb * 1024.0 * 1024.0) as u64),
                    format_size(p.write_bytes),
                    service
                );
                if !p.cmdline.is_empty() {
                    println!("        {}", p.cmdline);
                }
            }
        }
        Err(err) => println!("    {err}"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();

    match cli.command {
        Commands::Scan {
            walk,
            interval,
            threshold_mb,
            attribute,
            save,
        } => {
            let config = ScanConfig {
                interval: seconds(interval, "interval")?,
                ..walk.config()
            }
            .with_threshold_mb(threshold_mb);
            let scanner = Scanner::new(config)?;
            let result = scanner.scan(&cancel)?;

            println!(
                "Scanned {} files ({}) across {} path(s) over {:?}",
                format_count(result.snapshot2.file_count()),
                format_size(result.snapshot2.total_size()),
                result.paths.len(),
                result.interval
            );
            print_growth(&result.growing_files);
            if !result.growing_files.is_empty() {
                println!("Total growth: {}", format_size(result.total_growth));
            }

            if attribute && !result.growing_files.is_empty() {
                let attributor = ProcessAttributor::new();
                let resolver = ServiceResolver::new();
                for g in &result.growing_files {
                    println!("\n{}", g.path.display());
                    print_holders(&attributor, &resolver, &g.path);
                }
            }

            if let Some(path) = save {
                let written = SnapshotStore::new(".").save(&result.snapshot2, &path)?;
                println!("Saved snapshot to {}", written.display());
            }
        }

        Commands::Snapshot { walk, output } => {
            let snapshot = Scanner::new(walk.config())?.take_snapshot(&cancel)?;
            let written = SnapshotStore::new(".").save(&snapshot, &output)?;
            println!(
                "Saved {} files ({}) to {}",
                format_count(snapshot.file_count()),
                format_size(snapshot.total_size()),
                written.display()
            );
        }

        Commands::Compare {
            baseline,
            walk,
            threshold_mb,
        } => {
            let config = walk.config().with_threshold_mb(threshold_mb);
            let threshold = config.threshold_bytes;
            let earlier = SnapshotStore::new(".")
                .load(&baseline)
                .with_context(|| format!("loading {}", baseline.display()))?;
            let later = Scanner::new(config)?.take_snapshot(&cancel)?;

            let growth = analysis::diff(&earlier, &later, threshold);
            println!(
                "Compared against baseline from {}: total size {}",
                earlier.timestamp(),
                format_size_signed(later.total_size() as i128 - earlier.total_size() as i128)
            );
            print_growth(&growth);
        }

        Commands::Who { file } => {
            println!("{}", file.display());
            print_holders(&ProcessAttributor::new(), &ServiceResolver::new(), &file);
        }

        Commands::Kill { pid, timeout } => {
            let policy = TerminationPolicy::default()
                .with_graceful_timeout(seconds(timeout, "timeout")?);
            let outcome = TerminationController::new(policy).kill_with_cancel(pid, &cancel)?;
            match outcome {
                KillOutcome::AlreadyGone => println!("Process {pid} was not running"),
                KillOutcome::ExitedGracefully => println!("Process {pid} exited after SIGTERM"),
                KillOutcome::ExitedAfterForce => println!("Process {pid} killed with SIGKILL"),
            }
        }

        Commands::Signal { pid, signal } => {
            let signal = parse_signal(&signal)?;
            TerminationController::default().send_signal(pid, signal)?;
            println!("Sent {signal:?} to {pid}");
        }
    }

    Ok(())
}
