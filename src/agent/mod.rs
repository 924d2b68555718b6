// Agent orchestrator
// Turns one user utterance into one assistant reply, dispatching any
// tool calls the model requests in between


use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatProvider, ToolCallRequest};
use crate::tools::{ToolOutcome, ToolRegistry};
use crate::tools::handlers::SEARCH_WIKI;

const WELCOME_MESSAGE: &str =
    "Hi! I'm the campus assistant. Ask me about the wiki, facility and equipment \
     bookings, dorm inspections, or storage.";

const APOLOGY_MESSAGE: &str =
    "Sorry, I ran into a problem while answering. Please try again in a moment.";

const DEFAULT_SYSTEM_PROMPT: &str = "You are the assistant embedded in the campus services \
portal. Use the available tools to look up knowledge-base articles, bookings, dorm \
inspections, and storage before answering. Answer concisely and mention which \
information came from the knowledge base.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// Navigation hint derived from the best search hit of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSuggestion {
    pub title: String,
    pub link: String,
}

/// A search hit surfaced to the user alongside the answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceRef {
    pub article_id: i64,
    pub title: String,
    pub score: f32,
}

/// One entry in the append-only conversation log. Never mutated after
/// creation; the log only grows (or is reset wholesale).
#[derive(Debug, Clone)]
pub struct AgentMessage {
    pub seq: u64,
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub used_tools: Vec<ToolOutcome>,
    pub sources: Vec<SourceRef>,
    pub suggested_link: Option<NavigationSuggestion>,
}

impl AgentMessage {
    fn new(seq: u64, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            seq,
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            used_tools: Vec::new(),
            sources: Vec::new(),
            suggested_link: None,
        }
    }
}

/// Drives agent turns against the chat provider and the tool registry.
///
/// Tool calls within a turn are dispatched concurrently and joined; a
/// failing tool becomes a failed audit entry, never a failed turn. A
/// failing provider call degrades to an apology message, leaving the
/// conversation usable.
pub struct AgentOrchestrator {
    llm: Arc<dyn ChatProvider>,
    registry: ToolRegistry,
    system_prompt: String,
    history: Vec<AgentMessage>,
    next_seq: u64,
}

impl AgentOrchestrator {
    #[inline]
    pub fn new(llm: Arc<dyn ChatProvider>, registry: ToolRegistry) -> Self {
        let mut orchestrator = Self {
            llm,
            registry,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history: Vec::new(),
            next_seq: 0,
        };
        orchestrator.append_welcome();
        orchestrator
    }

    #[inline]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[inline]
    pub fn history(&self) -> &[AgentMessage] {
        &self.history
    }

    /// Reset the conversation to the single welcome message.
    #[inline]
    pub fn clear(&mut self) {
        self.history.clear();
        self.append_welcome();
    }

    /// Run one agent turn. Always appends exactly one assistant message
    /// and returns it.
    #[inline]
    pub async fn send(&mut self, user_text: &str) -> &AgentMessage {
        self.append(MessageRole::User, user_text.to_string());

        let specs = self.registry.specs();
        let mut conversation = self.wire_history();

        let first = match self.llm.complete(&conversation, &specs).await {
            Ok(turn) => turn,
            Err(error) => {
                warn!("Chat completion failed: {}", error);
                return self.append(MessageRole::Assistant, APOLOGY_MESSAGE.to_string());
            }
        };

        if !first.wants_tools() {
            let content = first.content.unwrap_or_else(|| APOLOGY_MESSAGE.to_string());
            return self.append(MessageRole::Assistant, content);
        }

        let outcomes = self.dispatch_all(&first.tool_calls).await;

        // Echo the tool-call request and every result back for the
        // user-visible completion.
        conversation.push(ChatMessage::assistant_tool_calls(
            first.content,
            first.tool_calls.clone(),
        ));
        for (call, outcome) in first.tool_calls.iter().zip(&outcomes) {
            let payload = serde_json::to_string(&outcome.result)
                .unwrap_or_else(|_| "{\"error\":true}".to_string());
            conversation.push(ChatMessage::tool_result(call.id.clone(), payload));
        }

        let final_content = match self.llm.complete(&conversation, &specs).await {
            Ok(turn) => turn.content.unwrap_or_else(|| APOLOGY_MESSAGE.to_string()),
            Err(error) => {
                warn!("Follow-up completion failed: {}", error);
                APOLOGY_MESSAGE.to_string()
            }
        };

        let suggested_link = navigation_suggestion(&outcomes);
        let sources = collect_sources(&outcomes);

        info!(
            "Agent turn finished: {} tool call(s), {} source(s)",
            outcomes.len(),
            sources.len()
        );

        let mut message = AgentMessage::new(self.take_seq(), MessageRole::Assistant, final_content);
        message.used_tools = outcomes;
        message.sources = sources;
        message.suggested_link = suggested_link;
        self.push(message)
    }

    /// Dispatch every requested call concurrently and wait for all of
    /// them. Outcome order matches request order.
    async fn dispatch_all(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutcome> {
        debug!("Dispatching {} tool call(s)", calls.len());
        join_all(
            calls
                .iter()
                .map(|call| self.registry.dispatch(&call.function.name, &call.function.arguments)),
        )
        .await
    }

    /// Project the visible log into wire messages, prefixed with the
    /// system prompt. Tool traffic from earlier turns is internal and
    /// never resubmitted.
    fn wire_history(&self) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system_prompt.clone())];
        for entry in &self.history {
            match entry.role {
                MessageRole::User => messages.push(ChatMessage::user(entry.content.clone())),
                MessageRole::Assistant => {
                    messages.push(ChatMessage::assistant(entry.content.clone()));
                }
                MessageRole::Tool => {}
            }
        }
        messages
    }

    fn append_welcome(&mut self) {
        self.next_seq = 0;
        let seq = self.take_seq();
        self.history
            .push(AgentMessage::new(seq, MessageRole::Assistant, WELCOME_MESSAGE));
    }

    fn append(&mut self, role: MessageRole, content: String) -> &AgentMessage {
        let message = AgentMessage::new(self.take_seq(), role, content);
        self.push(message)
    }

    fn push(&mut self, message: AgentMessage) -> &AgentMessage {
        self.history.push(message);
        self.history.last().expect("history cannot be empty")
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// The first successful knowledge-base search that produced a top
/// match decides the turn's navigation suggestion.
fn navigation_suggestion(outcomes: &[ToolOutcome]) -> Option<NavigationSuggestion> {
    outcomes
        .iter()
        .filter(|outcome| outcome.name == SEARCH_WIKI && outcome.success)
        .find_map(|outcome| {
            let top = outcome.result.get("top_match")?;
            Some(NavigationSuggestion {
                title: top.get("title")?.as_str()?.to_string(),
                link: top.get("link")?.as_str()?.to_string(),
            })
        })
}

/// All search hits surfaced this turn, deduplicated by article.
fn collect_sources(outcomes: &[ToolOutcome]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for outcome in outcomes {
        if outcome.name != SEARCH_WIKI || !outcome.success {
            continue;
        }
        let Some(results) = outcome.result.get("results").and_then(Value::as_array) else {
            continue;
        };
        for result in results {
            if let Ok(source) = serde_json::from_value::<SourceRef>(result.clone()) {
                if !sources.iter().any(|s| s.article_id == source.article_id) {
                    sources.push(source);
                }
            }
        }
    }
    sources
}
