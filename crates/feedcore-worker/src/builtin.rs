//! The reference method table exercised by the demo binary and the
//! integration tests. A production scheduler would link its own
//! `fetch`/`fetch_done` pair instead; `fetch` here is a stand-in that
//! simulates work without performing HTTP requests (out of scope).

use serde_json::{json, Value};

use crate::methods::{MethodError, MethodTable};

pub fn reference_methods() -> MethodTable {
    let mut table = MethodTable::new();

    table.register("add", |args, _kw| async move {
        let a = args.get(0).and_then(Value::as_f64).unwrap_or(0.0);
        let b = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(json!(a + b))
    });

    table.register("sleep", |args, _kw| async move {
        let seconds = args.get(0).and_then(Value::as_f64).unwrap_or(0.0);
        if seconds > 0.0 {
            tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
        }
        Ok(Value::Null)
    });

    table.register("crash", |_args, _kw| async move {
        // Exits the process immediately; the manager observes EOF and respawns.
        std::process::exit(1);
        #[allow(unreachable_code)]
        Ok::<Value, MethodError>(Value::Null)
    });

    table.register("fetch", |args, _kw| async move {
        let feed_id = args
            .get(0)
            .and_then(|item| item.get("feed_id"))
            .and_then(Value::as_i64);
        match feed_id {
            Some(id) => Ok(json!({ "feed_id": id, "status": "fetched" })),
            None => Err(MethodError::new("Error", "work item is missing feed_id")),
        }
    });

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_sums_two_numbers() {
        let table = reference_methods();
        let method = table.get("add").unwrap();
        let result = method(json!([2, 3]), json!({})).await.unwrap();
        assert_eq!(result, json!(5.0));
    }

    #[tokio::test]
    async fn fetch_requires_feed_id() {
        let table = reference_methods();
        let method = table.get("fetch").unwrap();
        let err = method(json!([{}]), json!({})).await.unwrap_err();
        assert_eq!(err.kind, "Error");
    }

    #[test]
    fn nope_is_not_registered() {
        let table = reference_methods();
        assert!(table.get("nope").is_none());
    }
}
