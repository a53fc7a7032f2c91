use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedcore_common::config::SupervisorConfig;
use feedcore_common::context::SupervisorContext;
use feedcore_common::frame::FrameLimits;
use feedcore_manager::{default_callbacks, DispatchLoop, FeedItem, Manager, ManagerConfig, StaticHunter};
use feedcore_sdk::TraceWriter;

fn main() -> anyhow::Result<()> {
    let config = SupervisorConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: SupervisorConfig) -> anyhow::Result<()> {
    let context = SupervisorContext::new(config.log_dir.clone());
    let manager_trace = context.trace("manager");
    let driver_trace = context.trace("dispatch-loop");

    manager_trace.info(&format!(
        "starting feedcore-manager {} (commit {})",
        feedcore_sdk::PackageInfo::VERSION,
        feedcore_sdk::PackageInfo::COMMIT_HASH,
    ));

    let shutdown = context.shutdown_token();
    ctrlc::set_handler(move || shutdown.cancel())?;

    let worker_binary = config.resolve_worker_binary()?;
    let socket_dir = std::env::temp_dir().join("feedcore");

    let manager_config = ManagerConfig {
        pool_size: config.workers,
        job_timeout: config.job_timeout(),
        worker_binary,
        socket_dir,
        limits: FrameLimits {
            max_request_bytes: config.max_request_bytes,
            max_response_bytes: config.max_response_bytes,
        },
        log_dir: config.log_dir.clone(),
    };

    stamp_worker_logs(&context, config.workers);

    let mut manager = Manager::bind(manager_config, manager_trace)?;
    manager.set_shutdown_token(context.shutdown_token());
    manager.start().await?;

    // The demo workload: a handful of feed IDs to run through the pool.
    // A production deployment would supply a database-backed WorkSource
    // implementing the same trait instead.
    let items: Vec<FeedItem> = (1..=20)
        .map(|feed_id| FeedItem { feed_id, sources_id: None, fqdn: None })
        .collect();
    let hunter = StaticHunter::new(items);

    let mut driver = DispatchLoop::new(
        &mut manager,
        &hunter,
        config.period(),
        default_callbacks(),
        driver_trace,
    );

    let shutdown_token = context.shutdown_token();
    tokio::select! {
        _ = driver.run_to_quiescence() => {
            tracing::info!("all demo work drained");
        }
        _ = shutdown_token.cancelled() => {
            tracing::info!("shutdown requested, draining in-flight jobs");
        }
    }

    tracing::info!(
        "drained {} items, {} left stale",
        hunter.completed_count(),
        hunter.stale_count()
    );

    manager.close_all(std::time::Duration::from_secs(5)).await;
    Ok(())
}

/// Pre-create and stamp each worker's log file via the shared
/// `{method}_open_log(fork_id)` hook before the pool forks any children, so
/// the file exists (and carries a start marker) even if a worker crashes
/// before writing its own first line.
fn stamp_worker_logs(context: &SupervisorContext, pool_size: u32) {
    use std::io::Write;
    for raw_id in 0..pool_size {
        match context.open_worker_log(raw_id) {
            Ok(Some(mut file)) => {
                let _ = writeln!(file, "--- manager starting worker {} ---", raw_id);
            }
            Ok(None) => break, // no log_dir configured; nothing to stamp for any id
            Err(e) => {
                tracing::warn!("failed to stamp log file for worker {}: {}", raw_id, e);
            }
        }
    }
}
