//! refit: queue code-improvement jobs for the given files and run them.
//!
//! Usage:
//!   refit-cli FILE...            queue the files, run, print the summary
//!   refit-cli --watch DIR        also watch DIR and keep running until ^C
//!
//! Configuration comes from `REFIT_*` environment variables (see
//! `QueueConfig::from_env`), loaded from `.env` if present.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refit_core::ports::UnconfiguredClient;
use refit_core::runners::builtin_registry;
use refit_core::{JobKind, JobQueue, QueueConfig, ResultSink, SqliteJobStore, watch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refit=info,refit_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut watch_dir: Option<PathBuf> = None;
    let mut files: Vec<PathBuf> = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => {
                let dir = args.next().ok_or("--watch requires a directory")?;
                watch_dir = Some(PathBuf::from(dir));
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }
    if files.is_empty() && watch_dir.is_none() {
        eprintln!("usage: refit-cli [--watch DIR] FILE...");
        std::process::exit(2);
    }

    let config = QueueConfig::from_env();
    let store = Arc::new(SqliteJobStore::open(&config.db_path)?);
    let registry = builtin_registry(Arc::new(UnconfiguredClient));
    let queue = Arc::new(
        JobQueue::new(store, registry, ResultSink::new(&config.results_dir))
            .with_batch_size(config.batch_size),
    );

    for file in files {
        let id = queue.enqueue(JobKind::CodeImprovement, file, 0).await?;
        tracing::info!(%id, "queued");
    }

    match watch_dir {
        None => {
            let summary = queue.run().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(dir) => {
            let handle = watch(Arc::clone(&queue), &dir, &config.watch_extension)?;

            // Drain the queue whenever something is pending, until ^C.
            let drain = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    loop {
                        if !queue.pending_status().await.is_empty() {
                            let summary = queue.run().await;
                            tracing::info!(
                                total = summary.total,
                                successful = summary.successful,
                                failed = summary.failed,
                                "run finished"
                            );
                        }
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    }
                })
            };

            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
            queue.request_stop();
            drain.abort();
            handle.stop();
        }
    }

    Ok(())
}
