//! Session State Model
//!
//! Types threaded through a behaviour cycle. The caller owns the
//! `BehaviorState` and passes it through successive `run_cycle` calls;
//! the engine never keeps state between invocations.
//!
//! Wire format (what a caller exchanges with the engine):
//!
//! ```json
//! {
//!   "current_time": "14:30",
//!   "history": [{"start": "13:00", "end": "14:30", "activity": "nap"}],
//!   "memory": {"last_query": "", "last_api_results": {}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An immutable past behaviour span. Created when a final decision is
/// committed, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub start: String,
    pub end: String,
    pub activity: String,
}

/// Mutable scratch memory carried between cycles.
///
/// `last_api_results` holds only the most recent query outcome; a new
/// query overwrites it wholesale, nothing is merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default)]
    pub last_query: String,
    #[serde(default)]
    pub last_api_results: Map<String, Value>,
}

/// The unit of session state passed into and returned from a cycle.
///
/// `history` is append-only and grows only via committed final decisions;
/// insertion order is chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorState {
    pub current_time: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub memory: Memory,
}

impl BehaviorState {
    /// Fresh state with no history and empty memory.
    pub fn new(current_time: impl Into<String>) -> Self {
        Self {
            current_time: current_time.into(),
            history: Vec::new(),
            memory: Memory::default(),
        }
    }
}

/// A finalized behaviour decision. Immutable once constructed: the
/// start/end/activity triple becomes a `HistoryEntry` while the full
/// record goes to the durable log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub start: String,
    pub end: String,
    pub activity: String,
    pub cause: String,
    pub mood: String,
    pub notes: String,
}

impl BehaviorRecord {
    /// Derive the in-memory history entry (cause/mood/notes are only
    /// retained in the durable log).
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            start: self.start.clone(),
            end: self.end.clone(),
            activity: self.activity.clone(),
        }
    }
}

/// Action the model proposed for this cycle.
///
/// Closed sum type so the interpreter can match exhaustively. Degenerate
/// proposals (empty query content, final_decision without a behaviour
/// object, unknown tag) are normalized to `Idle` during parsing, so a
/// `Query` always carries non-empty content and a `FinalDecision` always
/// carries a full record.
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    Query { content: String },
    FinalDecision(BehaviorRecord),
    Idle,
}

/// The model's structured reply for one cycle. Transient; not persisted
/// beyond the cycle that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtOutput {
    pub thought: String,
    pub next_action: NextAction,
}
