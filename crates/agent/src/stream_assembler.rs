//! Reassembles one streamed model response into text and tool calls.
//!
//! Tool-call fields arrive split across many small deltas, each addressed
//! by a zero-based index. Every delta for an index is appended to the
//! call's `id`, `name` and `arguments`; nothing is ever replaced.

use std::collections::BTreeMap;

use codeclaw_core::message::MessageToolCall;
use codeclaw_core::provider::{StreamChunk, Usage};

/// The finished result of one streamed turn.
#[derive(Debug, Clone, Default)]
pub struct AssembledTurn {
    /// Assistant text, `None` when the model produced none.
    pub text: Option<String>,
    /// Tool calls in index order.
    pub tool_calls: Vec<MessageToolCall>,
    /// Usage reported by the provider, if any.
    pub usage: Option<Usage>,
}

#[derive(Debug, Default)]
pub struct StreamAssembler {
    text: String,
    calls: BTreeMap<u32, MessageToolCall>,
    usage: Option<Usage>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Returns the content delta, if the chunk carried one.
    pub fn push(&mut self, chunk: StreamChunk) -> Option<String> {
        for delta in chunk.tool_calls {
            let call = self.calls.entry(delta.index).or_insert_with(|| MessageToolCall {
                id: String::new(),
                name: String::new(),
                arguments: String::new(),
            });
            if let Some(id) = delta.id {
                call.id.push_str(&id);
            }
            if let Some(name) = delta.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = delta.arguments {
                call.arguments.push_str(&arguments);
            }
        }

        if let Some(usage) = chunk.usage {
            let total = self.usage.get_or_insert_with(Usage::default);
            total.prompt_tokens += usage.prompt_tokens;
            total.completion_tokens += usage.completion_tokens;
            total.total_tokens += usage.total_tokens;
        }

        match chunk.content {
            Some(content) if !content.is_empty() => {
                self.text.push_str(&content);
                Some(content)
            }
            _ => None,
        }
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Consume the assembler at stream end.
    pub fn finish(self) -> AssembledTurn {
        let text = (!self.text.is_empty()).then_some(self.text);
        let tool_calls = self
            .calls
            .into_iter()
            .map(|(index, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{index}");
                }
                call
            })
            .collect();
        AssembledTurn {
            text,
            tool_calls,
            usage: self.usage,
        }
    }
}
