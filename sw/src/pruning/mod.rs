//! Tool output pruning
//!
//! Keeps the transcript sent to the model bounded. Tool results older than
//! the last `keep-last-messages` messages are replaced by a head/tail
//! stand-in once they exceed `tool-max-chars`; the raw text goes to the
//! [`ToolOutputStore`] first so it stays retrievable by call id.

mod store;

pub use store::ToolOutputStore;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{ContentBlock, Message, MessageContent};

/// Present in every stand-in; marks a result that has already been shortened
const OMITTED_MARKER: &str = "<omitted ";

/// Pruning thresholds (character counts)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Trailing messages that are never touched
    #[serde(rename = "keep-last-messages")]
    pub keep_last_messages: usize,

    /// Results up to this length are kept whole
    #[serde(rename = "tool-max-chars")]
    pub tool_max_chars: usize,

    #[serde(rename = "tool-head-chars")]
    pub tool_head_chars: usize,

    #[serde(rename = "tool-tail-chars")]
    pub tool_tail_chars: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            keep_last_messages: 20,
            tool_max_chars: 6000,
            tool_head_chars: 1200,
            tool_tail_chars: 800,
        }
    }
}

/// Bounded stand-in for one tool result
///
/// Text within `tool_max_chars` comes back unchanged; longer text keeps its
/// first `tool_head_chars` and last `tool_tail_chars` characters around an
/// omission marker naming `call_id`.
pub fn summarize_tool_output(text: &str, config: &PruningConfig, call_id: &str) -> String {
    let total = text.chars().count();
    if total <= config.tool_max_chars {
        return text.to_string();
    }

    let head_len = config.tool_head_chars.min(total);
    let tail_len = config.tool_tail_chars.min(total - head_len);
    let omitted = total - head_len - tail_len;
    let lines = text.matches('\n').count() + 1;

    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(total - tail_len).collect();
    debug!(%call_id, total, omitted, "summarize_tool_output: shortened");

    format!(
        "{}\n... {}{} chars, {} lines total; stored as tool_call_id={}> ...\n{}",
        head, OMITTED_MARKER, omitted, lines, call_id, tail
    )
}

/// Replace old tool results with stand-ins, storing raw text by call id
///
/// Idempotent: a stand-in for a stored id is always recomputed from the
/// stored raw text, so pruning a pruned transcript changes nothing.
pub fn prune(messages: &[Message], store: &mut ToolOutputStore, config: &PruningConfig) -> Vec<Message> {
    let cutoff = messages.len().saturating_sub(config.keep_last_messages);
    debug!(count = messages.len(), cutoff, "prune: called");

    messages
        .iter()
        .enumerate()
        .map(|(idx, msg)| {
            if idx >= cutoff || !msg.is_tool_result() {
                return msg.clone();
            }
            let MessageContent::Blocks(blocks) = &msg.content else {
                return msg.clone();
            };
            let blocks = blocks.iter().map(|block| prune_block(block, store, config)).collect();
            Message {
                role: msg.role,
                content: MessageContent::Blocks(blocks),
            }
        })
        .collect()
}

fn prune_block(block: &ContentBlock, store: &mut ToolOutputStore, config: &PruningConfig) -> ContentBlock {
    let ContentBlock::ToolResult {
        tool_use_id,
        content,
        is_error,
    } = block
    else {
        return block.clone();
    };

    let content = if tool_use_id.is_empty() {
        // nothing to key the raw text by
        if content.chars().count() <= config.tool_max_chars || content.contains(OMITTED_MARKER) {
            content.clone()
        } else {
            summarize_tool_output(content, config, tool_use_id)
        }
    } else {
        store.put(tool_use_id, content.as_str());
        let raw = store.get(tool_use_id).unwrap_or(content);
        summarize_tool_output(raw, config, tool_use_id)
    };

    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.clone(),
        content,
        is_error: *is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tool_message(id: &str, content: &str) -> Message {
        Message::user_blocks(vec![ContentBlock::tool_result(id, content, false)])
    }

    fn result_content(msg: &Message) -> &str {
        match &msg.content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { content, .. } => content,
                _ => panic!("Expected ToolResult block"),
            },
            _ => panic!("Expected blocks"),
        }
    }

    fn small_config() -> PruningConfig {
        PruningConfig {
            keep_last_messages: 1,
            tool_max_chars: 200,
            tool_head_chars: 50,
            tool_tail_chars: 50,
        }
    }

    #[test]
    fn test_default_config() {
        let config = PruningConfig::default();
        assert_eq!(config.keep_last_messages, 20);
        assert_eq!(config.tool_max_chars, 6000);
        assert_eq!(config.tool_head_chars, 1200);
        assert_eq!(config.tool_tail_chars, 800);
    }

    #[test]
    fn test_deserialize_kebab_keys() {
        let config: PruningConfig = serde_yaml::from_str("keep-last-messages: 4\ntool-max-chars: 100\n").unwrap();
        assert_eq!(config.keep_last_messages, 4);
        assert_eq!(config.tool_max_chars, 100);
        assert_eq!(config.tool_head_chars, 1200);
    }

    #[test]
    fn test_summarize_short_text_unchanged() {
        assert_eq!(summarize_tool_output("short", &small_config(), "c1"), "short");
    }

    #[test]
    fn test_summarize_marker_format() {
        let text = format!("{}\n{}", "a".repeat(150), "b".repeat(149));
        let out = summarize_tool_output(&text, &small_config(), "call_7");

        assert_eq!(
            out,
            format!(
                "{}\n... <omitted 200 chars, 2 lines total; stored as tool_call_id=call_7> ...\n{}",
                "a".repeat(50),
                "b".repeat(50)
            )
        );
    }

    #[test]
    fn test_summarize_counts_chars_not_bytes() {
        let text = "é".repeat(300);
        let out = summarize_tool_output(&text, &small_config(), "c");
        assert!(out.starts_with(&"é".repeat(50)));
        assert!(out.contains("<omitted 200 chars"));
    }

    #[test]
    fn test_large_result_pruned_and_stored() {
        let big = "x".repeat(10_000);
        let messages = vec![tool_message("call_big", &big), Message::assistant("done")];
        let mut store = ToolOutputStore::new();

        let pruned = prune(&messages, &mut store, &small_config());

        let stub = result_content(&pruned[0]);
        assert!(stub.contains("<omitted 9900 chars, 1 lines total; stored as tool_call_id=call_big>"));
        let without_marker = stub.replace(
            "\n... <omitted 9900 chars, 1 lines total; stored as tool_call_id=call_big> ...\n",
            "",
        );
        assert!(without_marker.chars().count() <= 100);
        assert_eq!(store.get("call_big").map(str::len), Some(10_000));
        assert_eq!(pruned[1], messages[1]);
    }

    #[test]
    fn test_recent_messages_untouched() {
        let big = "y".repeat(1_000);
        let messages = vec![tool_message("old", &big), tool_message("recent", &big)];
        let mut store = ToolOutputStore::new();

        let pruned = prune(&messages, &mut store, &small_config());

        assert_ne!(pruned[0], messages[0]);
        assert_eq!(pruned[1], messages[1]);
        assert!(!store.contains("recent"));
    }

    #[test]
    fn test_non_tool_messages_untouched() {
        let long_text = "z".repeat(1_000);
        let messages = vec![Message::assistant(long_text.clone()), Message::user(long_text), Message::user("x")];
        let mut store = ToolOutputStore::new();

        assert_eq!(prune(&messages, &mut store, &small_config()), messages);
        assert!(store.is_empty());
    }

    #[test]
    fn test_prune_twice_is_stable() {
        let messages = vec![
            tool_message("a", &"1\n".repeat(400)),
            tool_message("b", "short"),
            tool_message("", &"q".repeat(500)),
            Message::assistant("tail"),
        ];
        let mut store = ToolOutputStore::new();

        let once = prune(&messages, &mut store, &small_config());
        let twice = prune(&once, &mut store, &small_config());

        assert_eq!(once, twice);
        assert_eq!(store.get("a"), Some("1\n".repeat(400).as_str()));
        assert_eq!(store.get("b"), Some("short"));
    }

    fn message_strategy() -> impl Strategy<Value = Vec<(bool, String)>> {
        prop::collection::vec((any::<bool>(), "[a-z\\n ]{0,600}"), 0..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Pruning a pruned transcript changes nothing, and every pruned id
        /// keeps its original text in the store.
        #[test]
        fn prune_is_idempotent_and_complete(
            entries in message_strategy(),
            keep in 0usize..4,
            max in 20usize..300,
            head in 0usize..60,
            tail in 0usize..60,
        ) {
            let config = PruningConfig {
                keep_last_messages: keep,
                tool_max_chars: max,
                tool_head_chars: head,
                tool_tail_chars: tail,
            };
            let messages: Vec<Message> = entries
                .iter()
                .enumerate()
                .map(|(i, (is_tool, text))| {
                    if *is_tool {
                        tool_message(&format!("call_{}", i), text)
                    } else {
                        Message::assistant(text.clone())
                    }
                })
                .collect();
            let mut store = ToolOutputStore::new();

            let once = prune(&messages, &mut store, &config);
            let twice = prune(&once, &mut store, &config);
            prop_assert_eq!(&once, &twice);

            let cutoff = messages.len().saturating_sub(keep);
            for (i, (is_tool, text)) in entries.iter().enumerate() {
                if *is_tool && i < cutoff {
                    prop_assert_eq!(store.get(&format!("call_{}", i)), Some(text.as_str()));
                }
            }
        }
    }
}
