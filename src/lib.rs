//! soultrace
//!
//! Behaviour-trace engine for virtual personas. Each cycle asks an LLM
//! what the persona thinks and does next, optionally enriches its memory
//! from external information sources, and commits finalized behaviour
//! records to a durable log.
//!
//! # Architecture
//!
//! ```text
//! caller ──► BehaviorTracker::run_cycle ──► ChatProvider (LLM)
//!                     │
//!                     ├── SourceGateway (weather, bilibili, ...)
//!                     └── BehaviorLog (JSON array on disk)
//! ```
//!
//! The caller owns the `BehaviorState` and threads it through successive
//! cycles; the engine holds no session state of its own.

pub mod behavior_log;
pub mod bilibili;
pub mod config;
pub mod error;
pub mod provider;
pub mod sources;
pub mod state;
pub mod tracker;

pub use behavior_log::BehaviorLog;
pub use bilibili::BilibiliClient;
pub use config::Config;
pub use error::TrackerError;
pub use provider::{ChatMessage, ChatProvider, ChatResponse, OpenAiChatProvider};
pub use sources::{BilibiliSource, InfoLookup, InfoSource, SourceGateway, WeatherSource};
pub use state::{
    BehaviorRecord, BehaviorState, HistoryEntry, Memory, NextAction, ThoughtOutput,
};
pub use tracker::BehaviorTracker;
