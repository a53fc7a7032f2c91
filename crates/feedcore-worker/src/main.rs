mod builtin;
mod dispatch;
mod methods;

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use feedcore_common::frame::FrameLimits;
use feedcore_common::tracing::TraceManager;
use tokio::net::UnixStream;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Arguments passed by the manager when it spawns a worker child.
#[derive(Debug, Parser)]
struct Args {
    /// This worker's stable pool slot ID, used only for log labelling.
    #[arg(long = "worker-id")]
    worker_id: u32,

    /// Path to the Unix domain socket the manager is listening on.
    #[arg(long = "socket")]
    socket: String,

    /// Per-call wall-clock limit in seconds. `0` disables the timeout.
    #[arg(long = "job-timeout-secs", default_value_t = 0.0)]
    job_timeout_seconds: f64,

    #[arg(long = "max-request-bytes", default_value_t = feedcore_common::frame::DEFAULT_MAX_REQUEST_BYTES)]
    max_request_bytes: usize,

    #[arg(long = "max-response-bytes", default_value_t = feedcore_common::frame::DEFAULT_MAX_RESPONSE_BYTES)]
    max_response_bytes: usize,

    /// Directory to write this worker's own log file into, named
    /// `worker-<id>.log`. Falls back to inherited stdout/stderr when unset.
    #[arg(long = "log-dir")]
    log_dir: Option<PathBuf>,
}

/// A `File` shared behind a lock so `tracing_subscriber` can hand out a
/// fresh writer per log line without reopening the file each time.
#[derive(Clone)]
struct SharedFile(Arc<Mutex<std::fs::File>>);

impl io::Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    let exit_code = runtime.block_on(run(args));
    std::process::exit(exit_code);
}

async fn run(args: Args) -> i32 {
    let writer = match open_worker_log(&args) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("worker {} failed to open log file: {}", args.worker_id, e);
            return 1;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(writer)
        .init();

    let trace = TraceManager::new().get(&format!("worker-{}", args.worker_id));

    ignore_interactive_interrupt();

    let stream = match UnixStream::connect(&args.socket).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("worker {} failed to connect to {}: {}", args.worker_id, args.socket, e);
            return 1;
        }
    };

    let job_timeout = if args.job_timeout_seconds > 0.0 {
        Some(std::time::Duration::from_secs_f64(args.job_timeout_seconds))
    } else {
        None
    };

    let limits = FrameLimits {
        max_request_bytes: args.max_request_bytes,
        max_response_bytes: args.max_response_bytes,
    };

    let table = builtin::reference_methods();

    match dispatch::run(stream, &table, job_timeout, limits, &trace).await {
        Ok(()) => {
            tracing::info!("worker {} exiting cleanly", args.worker_id);
            0
        }
        Err(e) => {
            tracing::error!("worker {} exiting on error: {}", args.worker_id, e);
            1
        }
    }
}

/// Matches the base design's `{method}_open_log(fork_id)` convention: if a
/// log directory was configured, open (creating if needed) this worker's
/// own log file; otherwise keep writing to the inherited stdout.
fn open_worker_log(args: &Args) -> io::Result<BoxMakeWriter> {
    let Some(dir) = &args.log_dir else {
        return Ok(BoxMakeWriter::new(io::stdout));
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("worker-{}.log", args.worker_id));
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let shared = SharedFile(Arc::new(Mutex::new(file)));
    Ok(BoxMakeWriter::new(move || shared.clone()))
}

/// Only the manager's orderly shutdown path (closing the write half of the
/// channel) should end this process; ignore SIGINT so an interactive
/// terminal signal sent to the process group doesn't race the manager.
fn ignore_interactive_interrupt() {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, SigHandler, Signal};
        // Safety: installing a signal handler at startup before any other
        // threads are spawned.
        unsafe {
            let _ = signal::signal(Signal::SIGINT, SigHandler::SigIgn);
        }
    }
}
