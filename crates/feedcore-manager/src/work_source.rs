//! The external-collaborator contract: whatever decides what work exists
//! and when it's done. A production scheduler with concurrency caps,
//! per-source rate limits, and database-backed bookkeeping lives behind
//! this trait; `StaticHunter` below is a reference implementation good
//! enough to drive the dispatch loop end-to-end without any of that.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use feedcore_common::frame::ResponseFrame;

/// A unit of work handed to a worker's `fetch` method. Trimmed from the
/// reference Python `fetcher.headhunter.Item` down to the fields the core
/// needs for logging and correlation; a real scheduler's item would carry
/// more (URL, last-fetch timestamps, etc.) but those stay opaque to the
/// core as far as it's concerned — only this crate's reference source uses
/// them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub feed_id: i64,
    #[serde(default)]
    pub sources_id: Option<i64>,
    #[serde(default)]
    pub fqdn: Option<String>,
}

impl FeedItem {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("FeedItem is always serializable")
    }
}

/// The contract the external scheduler fulfills: what work exists, when a
/// worker should be given a new item, and what to do when one finishes.
pub trait WorkSource: Send + Sync {
    fn has_work(&self) -> bool;
    fn next_work(&self) -> Option<FeedItem>;
    fn mark_issued(&self, item: &FeedItem);
    fn completed(&self, response: &ResponseFrame);
    fn check_stale(&self);
}

struct HunterState {
    unissued: Vec<FeedItem>,
    issued: Vec<FeedItem>,
    completed: Vec<FeedItem>,
}

/// An in-memory `WorkSource` seeded with a fixed list of items. Mirrors the
/// issue/complete bookkeeping of the reference Python `HeadHunter` —
/// `queued` items move from unissued to issued on `mark_issued`, and off
/// the issued list on `completed` — without the database, rate limiting, or
/// HTTP fetching a real hunter would also own.
pub struct StaticHunter {
    state: Mutex<HunterState>,
}

impl StaticHunter {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self {
            state: Mutex::new(HunterState {
                unissued: items,
                issued: Vec::new(),
                completed: Vec::new(),
            }),
        }
    }

    /// Items marked issued but never completed — the signal a real
    /// scheduler uses to detect a lost `WorkItem` (§7: callbacks are never
    /// invoked for crashed workers).
    pub fn stale_count(&self) -> usize {
        self.state.lock().issued.len()
    }

    pub fn completed_count(&self) -> usize {
        self.state.lock().completed.len()
    }
}

impl WorkSource for StaticHunter {
    fn has_work(&self) -> bool {
        let state = self.state.lock();
        !state.unissued.is_empty() || !state.issued.is_empty()
    }

    fn next_work(&self) -> Option<FeedItem> {
        self.state.lock().unissued.pop()
    }

    fn mark_issued(&self, item: &FeedItem) {
        self.state.lock().issued.push(item.clone());
    }

    fn completed(&self, response: &ResponseFrame) {
        let Some(arg) = response.args.first() else { return };
        let Ok(item) = serde_json::from_value::<FeedItem>(arg.clone()) else { return };
        let mut state = self.state.lock();
        state.issued.retain(|issued| issued.feed_id != item.feed_id);
        state.completed.push(item);
    }

    fn check_stale(&self) {
        // A production hunter would re-queue items issued past some
        // deadline; the reference source has no deadline of its own so
        // this is a no-op, exercised by tests asserting it doesn't panic.
    }
}
