//! Behaviour Tracker
//!
//! The Thought → Query → Decision cycle engine. One `run_cycle` call:
//!
//! 1. Build a persona prompt from the session state and ask the chat
//!    provider what the persona thinks and does next.
//! 2. Parse the reply into a `ThoughtOutput`.
//! 3. Interpret the proposed action: query the information source
//!    gateway, commit a final decision to history and the behaviour log,
//!    or idle.
//!
//! The caller owns the `BehaviorState` and threads it through successive
//! cycles; a failed cycle returns an error and leaves the state exactly
//! as it was passed in.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::behavior_log::BehaviorLog;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::provider::{ChatProvider, OpenAiChatProvider};
use crate::sources::{InfoLookup, SourceGateway};
use crate::state::{BehaviorRecord, BehaviorState, NextAction, ThoughtOutput};

/// Cycle engine for one persona
pub struct BehaviorTracker {
    provider: Option<Arc<dyn ChatProvider>>,
    gateway: Arc<dyn InfoLookup>,
    log: BehaviorLog,
    persona: String,
}

impl BehaviorTracker {
    /// Tracker with explicit collaborators (the test seam).
    pub fn new(
        config: &Config,
        provider: Option<Arc<dyn ChatProvider>>,
        gateway: Arc<dyn InfoLookup>,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            gateway,
            log: BehaviorLog::new(&config.data_dir)?,
            persona: config.persona.clone(),
        })
    }

    /// Tracker wired to the production provider and gateway.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = OpenAiChatProvider::from_config(config)
            .map(|p| Arc::new(p) as Arc<dyn ChatProvider>);
        let gateway = Arc::new(SourceGateway::from_config(config));
        Self::new(config, provider, gateway)
    }

    /// Access to the durable log (read-back on demand).
    pub fn log(&self) -> &BehaviorLog {
        &self.log
    }

    /// Execute one full reasoning cycle, mutating the session in place.
    pub async fn run_cycle(&self, state: &mut BehaviorState) -> Result<ThoughtOutput> {
        let output = self.generate_thought(state).await?;
        self.interpret(&output, state).await?;
        self.accumulate_context(state, &output);
        Ok(output)
    }

    /// Ask the provider for a thought and proposed next action.
    pub async fn generate_thought(&self, state: &BehaviorState) -> Result<ThoughtOutput> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(TrackerError::ProviderUnavailable)?;

        let prompt = self.build_prompt(state);
        debug!("Thought prompt ({} chars)", prompt.len());

        let response = provider
            .text_chat(&prompt, &[], &[], None)
            .await
            .map_err(|e| TrackerError::Provider(e.to_string()))?;

        let output = parse_model_reply(&response.completion_text)?;
        info!("Thought generated, next action: {}", action_label(&output.next_action));
        Ok(output)
    }

    /// Update memory or history based on the proposed action.
    ///
    /// Gateway errors are folded into the result mapping and never fail
    /// the cycle; a behaviour-log write failure does. The log is written
    /// before history grows, so an error leaves the state untouched.
    pub async fn interpret(&self, output: &ThoughtOutput, state: &mut BehaviorState) -> Result<()> {
        match &output.next_action {
            NextAction::Query { content } => {
                state.memory.last_query = content.clone();
                state.memory.last_api_results = self.gateway.lookup(content).await;
            }
            NextAction::FinalDecision(record) => {
                self.log.append(record).await?;
                state.history.push(record.to_history_entry());
            }
            NextAction::Idle => {
                debug!("Idle cycle, no state change");
            }
        }
        Ok(())
    }

    /// Extension point for richer cross-cycle context. Currently only
    /// guarantees `last_api_results` is present, which the typed state
    /// already does.
    fn accumulate_context(&self, _state: &mut BehaviorState, _output: &ThoughtOutput) {}

    fn build_prompt(&self, state: &BehaviorState) -> String {
        let history_text = state
            .history
            .iter()
            .map(|h| format!("{}-{}: {}", h.start, h.end, h.activity))
            .collect::<Vec<_>>()
            .join("\n");

        let memory_text = serde_json::to_string(&state.memory.last_api_results)
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            "{persona}\n\
             The time is now {time}. Today's record so far:\n{history}\n\
             Last query: {query}, result: {memory}\n\
             Reply with a single JSON object containing \"thought\" (free text) and \
             \"next_action\". \"next_action\" is one of:\n\
             {{\"type\": \"query\", \"content\": \"<text to look up>\"}}\n\
             {{\"type\": \"final_decision\", \"behavior\": {{\"start\": \"HH:MM\", \
             \"end\": \"HH:MM\", \"activity\": \"...\", \"cause\": \"...\", \
             \"mood\": \"...\", \"notes\": \"...\"}}}}\n\
             {{\"type\": \"idle\"}}",
            persona = self.persona,
            time = state.current_time,
            history = history_text,
            query = state.memory.last_query,
            memory = memory_text,
        )
    }
}

fn action_label(action: &NextAction) -> &'static str {
    match action {
        NextAction::Query { .. } => "query",
        NextAction::FinalDecision(_) => "final_decision",
        NextAction::Idle => "idle",
    }
}

// ---------------------------------------------------------------------------
// Model reply parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    thought: String,
    next_action: Option<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type", default)]
    kind: String,
    content: Option<String>,
    behavior: Option<Value>,
}

/// Parse the provider's reply text into a structured thought.
///
/// Degenerate but well-formed proposals (empty query content, missing
/// behaviour object, unknown type tag) normalize to `Idle`; structural
/// problems (not JSON, behaviour object missing required fields) are
/// `MalformedModelOutput`.
pub fn parse_model_reply(raw: &str) -> Result<ThoughtOutput> {
    let reply: RawReply = match serde_json::from_str(raw.trim()) {
        Ok(reply) => reply,
        Err(first_err) => {
            // Models often wrap the object in prose or a code fence.
            let candidate = extract_json_object(raw).ok_or_else(|| {
                TrackerError::MalformedModelOutput(format!("not a JSON object: {first_err}"))
            })?;
            serde_json::from_str(candidate)
                .map_err(|e| TrackerError::MalformedModelOutput(format!("bad reply shape: {e}")))?
        }
    };

    let next_action = match reply.next_action {
        None => NextAction::Idle,
        Some(action) => match action.kind.as_str() {
            "query" => match action.content {
                Some(content) if !content.is_empty() => NextAction::Query { content },
                _ => NextAction::Idle,
            },
            "final_decision" => match action.behavior {
                Some(behavior) => {
                    let record: BehaviorRecord =
                        serde_json::from_value(behavior).map_err(|e| {
                            TrackerError::MalformedModelOutput(format!(
                                "incomplete behaviour object: {e}"
                            ))
                        })?;
                    NextAction::FinalDecision(record)
                }
                None => NextAction::Idle,
            },
            _ => NextAction::Idle,
        },
    };

    Ok(ThoughtOutput {
        thought: reply.thought,
        next_action,
    })
}

/// Extract the first balanced JSON object from text.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, ChatResponse};
    use crate::sources::InfoLookup;
    use crate::state::{HistoryEntry, Memory};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    struct ScriptedProvider {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn text_chat(
            &self,
            _prompt: &str,
            _contexts: &[ChatMessage],
            _image_urls: &[String],
            _tool_spec: Option<&Value>,
        ) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                completion_text: self.reply.clone(),
            })
        }
    }

    struct CannedGateway {
        result: Map<String, Value>,
    }

    #[async_trait]
    impl InfoLookup for CannedGateway {
        async fn lookup(&self, _query: &str) -> Map<String, Value> {
            self.result.clone()
        }
    }

    fn tracker_with(
        dir: &TempDir,
        reply: &str,
        gateway_result: Map<String, Value>,
    ) -> BehaviorTracker {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        BehaviorTracker::new(
            &config,
            Some(Arc::new(ScriptedProvider {
                reply: reply.to_string(),
            })),
            Arc::new(CannedGateway {
                result: gateway_result,
            }),
        )
        .unwrap()
    }

    fn base_state() -> BehaviorState {
        BehaviorState {
            current_time: "14:30".into(),
            history: vec![HistoryEntry {
                start: "13:00".into(),
                end: "14:30".into(),
                activity: "nap".into(),
            }],
            memory: Memory::default(),
        }
    }

    #[test]
    fn test_parse_query_action() {
        let output = parse_model_reply(
            r#"{"thought":"curious","next_action":{"type":"query","content":"weather today"}}"#,
        )
        .unwrap();
        assert_eq!(output.thought, "curious");
        assert_eq!(
            output.next_action,
            NextAction::Query {
                content: "weather today".into()
            }
        );
    }

    #[test]
    fn test_parse_degenerate_actions_normalize_to_idle() {
        for raw in [
            r#"{"thought":"t"}"#,
            r#"{"thought":"t","next_action":{"type":"idle"}}"#,
            r#"{"thought":"t","next_action":{"type":"query"}}"#,
            r#"{"thought":"t","next_action":{"type":"query","content":""}}"#,
            r#"{"thought":"t","next_action":{"type":"final_decision"}}"#,
            r#"{"thought":"t","next_action":{"type":"nonsense"}}"#,
        ] {
            let output = parse_model_reply(raw).unwrap();
            assert_eq!(output.next_action, NextAction::Idle, "raw: {raw}");
        }
    }

    #[test]
    fn test_parse_non_json_is_malformed() {
        let err = parse_model_reply("I decided to take a nap.").unwrap_err();
        assert!(matches!(err, TrackerError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_parse_incomplete_behavior_is_malformed() {
        let err = parse_model_reply(
            r#"{"thought":"t","next_action":{"type":"final_decision","behavior":{"start":"10:00"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_parse_reply_wrapped_in_code_fence() {
        let raw = "Here you go:\n```json\n{\"thought\":\"ok\",\"next_action\":{\"type\":\"idle\"}}\n```";
        let output = parse_model_reply(raw).unwrap();
        assert_eq!(output.thought, "ok");
        assert_eq!(output.next_action, NextAction::Idle);
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let s = r#"note {"a": "{not a brace}", "b": 1} tail"#;
        assert_eq!(extract_json_object(s), Some(r#"{"a": "{not a brace}", "b": 1}"#));
    }

    #[tokio::test]
    async fn test_cycle_without_provider_fails() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let tracker = BehaviorTracker::new(
            &config,
            None,
            Arc::new(CannedGateway { result: Map::new() }),
        )
        .unwrap();

        let mut state = base_state();
        let err = tracker.run_cycle(&mut state).await.unwrap_err();
        assert!(matches!(err, TrackerError::ProviderUnavailable));
        assert_eq!(state, base_state());
    }

    #[tokio::test]
    async fn test_query_cycle_overwrites_memory() {
        let dir = TempDir::new().unwrap();
        let mut canned = Map::new();
        canned.insert("weather".to_string(), json!("25°C"));

        let tracker = tracker_with(
            &dir,
            r#"{"thought":"curious","next_action":{"type":"query","content":"weather today"}}"#,
            canned.clone(),
        );

        let mut state = base_state();
        state.memory.last_query = "old query".into();
        state
            .memory
            .last_api_results
            .insert("stale".to_string(), json!(true));

        tracker.run_cycle(&mut state).await.unwrap();

        assert_eq!(state.memory.last_query, "weather today");
        assert_eq!(state.memory.last_api_results, canned);
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_final_decision_cycle_commits_record() {
        let dir = TempDir::new().unwrap();
        let reply = r#"{"thought":"tired","next_action":{"type":"final_decision","behavior":{
            "start":"14:30","end":"15:00","activity":"coding",
            "cause":"deadline","mood":"focused","notes":""}}}"#;
        let tracker = tracker_with(&dir, reply, Map::new());

        let mut state = base_state();
        tracker.run_cycle(&mut state).await.unwrap();

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[1].start, "14:30");
        assert_eq!(state.history[1].end, "15:00");
        assert_eq!(state.history[1].activity, "coding");

        let records = tracker.log().read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cause, "deadline");
        assert_eq!(records[0].mood, "focused");
    }

    #[tokio::test]
    async fn test_idle_cycle_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_with(
            &dir,
            r#"{"thought":"nothing to do","next_action":{"type":"idle"}}"#,
            Map::new(),
        );

        let mut state = base_state();
        let before = state.clone();
        tracker.run_cycle(&mut state).await.unwrap();

        assert_eq!(state, before);
        assert!(tracker.log().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_without_mutation() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_with(&dir, "total nonsense", Map::new());

        let mut state = base_state();
        let before = state.clone();
        let err = tracker.run_cycle(&mut state).await.unwrap_err();

        assert!(matches!(err, TrackerError::MalformedModelOutput(_)));
        assert_eq!(state, before);
    }
}
