//! The worker child's single-threaded dispatch loop: receive one request,
//! invoke its method under a per-call deadline, reply, repeat.

use std::time::Duration;

use feedcore_common::{FrameLimits, ProtocolError, RequestFrame, ResponseFrame, Tracing};
use feedcore_sdk::trace::TraceWriter;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::methods::MethodTable;

/// Run the dispatch loop until the manager closes its write half (clean
/// exit) or an unrecoverable protocol error occurs (propagated to the
/// caller, which exits non-zero).
pub async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    table: &MethodTable,
    job_timeout: Option<Duration>,
    limits: FrameLimits,
    trace: &Tracing,
) -> anyhow::Result<()> {
    loop {
        let request = match feedcore_common::frame::read_request(&mut stream, limits.max_request_bytes).await {
            Ok(request) => request,
            Err(ProtocolError::Eof) => {
                trace.verbose("manager closed the channel, exiting");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        trace.verbose(&format!("dispatching {}", request.method));
        let response = handle_one(table, &request, job_timeout).await;

        match feedcore_common::frame::write_response(&mut stream, &response, limits.max_response_bytes).await {
            Ok(()) => {}
            Err(ProtocolError::Eof) => {
                trace.verbose("manager closed its read side, exiting");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn handle_one(
    table: &MethodTable,
    request: &RequestFrame,
    job_timeout: Option<Duration>,
) -> ResponseFrame {
    let Some(method) = table.get(&request.method) else {
        return ResponseFrame::err(
            request,
            "NoSuchMethod",
            format!("no such method: {}", request.method),
        );
    };

    let args = Value::Array(request.args.clone());
    let kw = Value::Object(request.kw.clone());
    let invocation = method(args, kw);

    let outcome = match job_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, invocation).await {
            Ok(result) => result,
            Err(_) => {
                return ResponseFrame::err(
                    request,
                    "Timeout",
                    format!("{} exceeded {:?}", request.method, deadline),
                )
            }
        },
        None => invocation.await,
    };

    match outcome {
        Ok(ret) => ResponseFrame::ok(request, ret),
        Err(err) => ResponseFrame::err(request, err.kind, err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcore_common::tracing::TraceManager;
    use serde_json::json;
    use tokio::io::duplex;

    fn demo_table() -> MethodTable {
        let mut table = MethodTable::new();
        table.register("add", |args, _kw| async move {
            let a = args[0].as_f64().unwrap_or(0.0);
            let b = args[1].as_f64().unwrap_or(0.0);
            Ok(json!(a + b))
        });
        table.register("sleep", |args, _kw| async move {
            let secs = args[0].as_f64().unwrap_or(0.0);
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            Ok(Value::Null)
        });
        table
    }

    #[tokio::test]
    async fn replies_to_a_known_method() {
        let (mut client, server) = duplex(4096);
        let table = demo_table();
        let trace = TraceManager::new().get("test-worker");

        let worker = tokio::spawn(async move {
            run(server, &table, None, FrameLimits::default(), &trace).await
        });

        let request = RequestFrame::new("add", vec![json!(1), json!(2)], Default::default());
        feedcore_common::frame::write_request(&mut client, &request, 32 * 1024)
            .await
            .unwrap();
        let response = feedcore_common::frame::read_response(&mut client, 8 * 1024)
            .await
            .unwrap();
        assert_eq!(response.ret, Some(json!(3.0)));

        drop(client);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_method_yields_no_such_method() {
        let (mut client, server) = duplex(4096);
        let table = demo_table();
        let trace = TraceManager::new().get("test-worker");

        let worker = tokio::spawn(async move {
            run(server, &table, None, FrameLimits::default(), &trace).await
        });

        let request = RequestFrame::new("nope", vec![], Default::default());
        feedcore_common::frame::write_request(&mut client, &request, 32 * 1024)
            .await
            .unwrap();
        let response = feedcore_common::frame::read_response(&mut client, 8 * 1024)
            .await
            .unwrap();
        assert_eq!(response.exc.as_deref(), Some("NoSuchMethod"));

        drop(client);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn slow_call_times_out_and_worker_stays_usable() {
        let (mut client, server) = duplex(4096);
        let table = demo_table();
        let trace = TraceManager::new().get("test-worker");

        let worker = tokio::spawn(async move {
            run(server, &table, Some(Duration::from_millis(50)), FrameLimits::default(), &trace).await
        });

        let sleepy = RequestFrame::new("sleep", vec![json!(5)], Default::default());
        feedcore_common::frame::write_request(&mut client, &sleepy, 32 * 1024)
            .await
            .unwrap();
        let response = feedcore_common::frame::read_response(&mut client, 8 * 1024)
            .await
            .unwrap();
        assert_eq!(response.exc.as_deref(), Some("Timeout"));

        let next = RequestFrame::new("sleep", vec![json!(0)], Default::default());
        feedcore_common::frame::write_request(&mut client, &next, 32 * 1024)
            .await
            .unwrap();
        let response = feedcore_common::frame::read_response(&mut client, 8 * 1024)
            .await
            .unwrap();
        assert!(response.is_ok());

        drop(client);
        worker.await.unwrap().unwrap();
    }
}
