use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use aero_tbprof::Profiler;
use aero_tbprof_replay::{replay, ReplayHost};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "AERO_TBPROF_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "aero-tbprof-replay",
    about = "Replay a recorded translation/execution trace through the block profiler."
)]
struct Args {
    /// Trace file (JSON lines); `-` reads stdin
    trace: PathBuf,

    /// Profiler option, e.g. `bb-out-file=run.bb` (repeatable; comma separated lists accepted)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_delimiter = ',')]
    options: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let profiler = Profiler::from_args(&args.options).context("invalid profiler options")?;

    let input: Box<dyn BufRead> = if args.trace.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.trace)
            .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let mut host = ReplayHost::new(stdout.lock());

    let stats = replay(input, &profiler, &mut host)
        .with_context(|| format!("failed to replay {}", args.trace.display()))?;
    let summary = profiler.finish(&mut host).context("failed to write profile")?;
    host.into_inner().flush().context("failed to flush stdout")?;

    tracing::info!(
        events = stats.events,
        translations = stats.translations,
        executions = stats.executions,
        intervals = summary.intervals,
        "replay complete"
    );
    Ok(())
}
