use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use riskfuse_config::Config;
use riskfuse_core::{BatchEvent, BatchOrchestrator, HttpSignalClient, ScanPipeline};
use riskfuse_model::{FileDescriptor, JobState, ScanJob};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config: &Config, paths: Vec<PathBuf>, record_history: bool) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }
        files.push(FileDescriptor::from_path(path, meta.len()));
    }

    let client = HttpSignalClient::new(config.signal.clone())
        .context("failed to build signal client")?;
    let pipeline = Arc::new(ScanPipeline::new(Arc::new(client), config.fusion_engine()));
    let mut orchestrator = BatchOrchestrator::new(pipeline);
    if record_history {
        orchestrator = orchestrator.with_history(Arc::new(config.history.open_store()));
    }

    info!(
        files = files.len(),
        concurrency = %config.concurrency_limit(),
        policy = config.fusion.name(),
        base_url = %config.signal.base_url,
        "starting scan"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling remaining scans");
                cancel.cancel();
            }
        })
    };

    let (handle, mut events) =
        orchestrator.start_batch(files, config.concurrency_limit(), cancel);

    while let Some(event) = events.next().await {
        match event {
            Ok(BatchEvent::JobUpdated { job, .. }) => print_job(&job),
            Ok(BatchEvent::Progress { processed, total }) => {
                eprintln!("[{processed}/{total}]");
            }
            Ok(BatchEvent::Finished(_)) => break,
            Err(err) => warn!(error = %err, "scan events dropped"),
        }
    }

    let report = handle.await.context("scan task panicked")?;
    ctrl_c.abort();

    let summary = &report.summary;
    println!();
    println!(
        "{} file(s): {} completed, {} failed{}",
        summary.total,
        summary.completed,
        summary.errored,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    for job in &report.jobs {
        match (job.state(), job.score(), job.label()) {
            (JobState::Completed, Some(score), Some(label)) => {
                println!("  {:>3}  {:<10}  {}", score, label, job.file().name());
            }
            _ => println!(
                "  ---  {:<10}  {}: {}",
                "error",
                job.file().name(),
                job.error().unwrap_or("unknown error")
            ),
        }
    }
    Ok(())
}

fn print_job(job: &ScanJob) {
    match job.state() {
        JobState::Processing => eprintln!("scanning {}", job.file().name()),
        JobState::Completed => {
            if let (Some(score), Some(label)) = (job.score(), job.label()) {
                eprintln!("{}: {} ({})", job.file().name(), score, label);
            }
        }
        JobState::Error => eprintln!(
            "{}: failed: {}",
            job.file().name(),
            job.error().unwrap_or("unknown error")
        ),
        JobState::Queued => {}
    }
}
