//! Context compaction.

use apiary_llm::{ChatProvider, ChatRequest, Message, MessageRole};
use tracing::debug;

use crate::error::RuntimeResult;

/// Replaces older messages with a summarizing synthetic message.
///
/// Invariants: the leading system message (when present) survives unchanged,
/// and the tail from the last complete tool-call/tool-result pair onward is
/// preserved verbatim.
#[derive(Debug, Clone)]
pub struct ContextCompactor {
    /// Compaction only runs when the history is longer than this.
    pub min_messages: usize,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self { min_messages: 8 }
    }
}

impl ContextCompactor {
    /// Create a compactor with a custom minimum history length.
    #[must_use]
    pub fn new(min_messages: usize) -> Self {
        Self { min_messages }
    }

    /// Compact `messages`, asking `provider` for the summary.
    ///
    /// Returns `None` when the history is too short to bother.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn compact(
        &self,
        messages: &[Message],
        provider: &dyn ChatProvider,
        model: &str,
    ) -> RuntimeResult<Option<Vec<Message>>> {
        if messages.len() <= self.min_messages {
            return Ok(None);
        }

        let has_system = messages
            .first()
            .is_some_and(|m| m.role == MessageRole::System);
        let head = usize::from(has_system);
        let tail_start = preserved_tail_start(messages, head);

        if tail_start <= head.saturating_add(1) {
            // Nothing old enough to fold away.
            return Ok(None);
        }

        let older = &messages[head..tail_start];
        let transcript = render_transcript(older);

        let summary_request = ChatRequest::new(
            model,
            vec![
                Message::system(
                    "Summarize the following conversation so an agent can continue it. \
                     Keep decisions, open questions, file paths, and results. Be concise.",
                ),
                Message::user(transcript),
            ],
        );
        let response = provider.chat(&summary_request).await?;
        let summary = response.message.content;

        debug!(
            folded = older.len(),
            kept = messages.len().saturating_sub(tail_start),
            "Compacted conversation"
        );

        let mut compacted = Vec::with_capacity(
            head.saturating_add(1)
                .saturating_add(messages.len().saturating_sub(tail_start)),
        );
        compacted.extend(messages[..head].iter().cloned());
        compacted.push(Message::user(format!(
            "<conversation-summary>\n{summary}\n</conversation-summary>"
        )));
        compacted.extend(messages[tail_start..].iter().cloned());
        Ok(Some(compacted))
    }
}

/// Index where the preserved tail begins: the last assistant message with
/// tool calls (so its results stay paired), or just the final message when
/// no tool calls exist.
fn preserved_tail_start(messages: &[Message], head: usize) -> usize {
    let last_tool_call = messages
        .iter()
        .enumerate()
        .skip(head)
        .rev()
        .find(|(_, m)| m.role == MessageRole::Assistant && m.has_tool_calls())
        .map(|(i, _)| i);

    last_tool_call.unwrap_or_else(|| messages.len().saturating_sub(1).max(head))
}

fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };
        out.push_str(role);
        out.push_str(": ");
        if message.content.is_empty() && message.has_tool_calls() {
            let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
            out.push_str(&format!("[called {}]", names.join(", ")));
        } else {
            out.push_str(&message.content);
        }
        out.push('\n');
    }
    out
}
