//! scan_demo - run the default scan pipeline against a URL.
//!
//! Prints live progress and log lines, then the JSON report of the
//! simulated findings. Ctrl-C cancels the run.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use scanflow::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "scan_demo", about = "Run the simulated DOM-XSS scan pipeline")]
struct Args {
    /// Target URL.
    url: String,

    /// Scan the whole domain instead of a single page.
    #[arg(long)]
    full: bool,

    /// Confirm findings with live payloads.
    #[arg(long)]
    real_testing: bool,

    /// Run without tick and stage delays.
    #[arg(long)]
    fast: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Ask the security assistant a question after the scan.
    #[arg(long)]
    ask: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(if args.json_logs { LogFormat::Json } else { LogFormat::Pretty });

    let config = if args.fast {
        ExecutorConfig::immediate()
    } else {
        ExecutorConfig::default()
    };
    let executor = PipelineExecutor::new(config).with_event_sink(Arc::new(LoggingEventSink::debug()));

    let mut scan = ScanConfig::new(&args.url).with_scan_type(if args.full {
        ScanType::Full
    } else {
        ScanType::Single
    });
    scan.options.real_testing = args.real_testing;

    let handle = executor
        .start(&scan_stage_table(), scan.clone(), Arc::new(DemoResultProducer))
        .context("starting scan")?;

    let mut updates = handle.subscribe();
    for entry in &updates.backlog {
        println!("{entry}");
    }
    loop {
        tokio::select! {
            event = updates.next() => match event {
                Some(RunEvent::Log(entry)) => println!("{entry}"),
                Some(RunEvent::Progress { stage_id, progress }) => {
                    println!("  {stage_id:<12} {progress:>5.1}%");
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if !handle.cancel() {
                    println!("Results are being collected, cancel refused");
                }
            }
        }
    }

    let results = match handle.wait().await {
        RunOutcome::Completed { results } => results,
        RunOutcome::Cancelled { reason } => {
            println!("Scan cancelled ({reason})");
            return Ok(());
        }
        RunOutcome::Failed(failure) => return Err(anyhow::Error::new(failure).context("scan failed")),
    };

    let published = executor
        .publisher()
        .latest()
        .context("completed run has no published results")?;
    let report = ScanReport::new(&published, &scan)?;
    println!("{}", report.to_json_pretty()?);

    let history = ScanHistory::new();
    let entry = history.record_published(&published, &scan);
    println!(
        "{} targets, {} findings, highest severity {} ({} results)",
        published.summary.total_targets,
        entry.vulnerabilities,
        entry.severity,
        results.len()
    );

    if let Some(question) = args.ask {
        println!("{}", Responder::security_assistant().respond(&question));
    }
    Ok(())
}
