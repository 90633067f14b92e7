//! Executor turn loop - drives one plan step to a structured result
//!
//! Each round sends `[GOAL/CURRENT STEP] + transcript` (pruned) to the model.
//! Tool calls are executed in order through the registry; raw results go to
//! the session's tool output store and bounded stand-ins go to the
//! transcript. A reply without tool calls ends the step and is parsed into a
//! [`StepResult`].

use std::collections::HashSet;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, StopReason, TokenUsage, ToolCall,
};
use crate::parse::parse_step_result;
use crate::pruning::{ToolOutputStore, prune, summarize_tool_output};
use crate::session::{SessionState, StepResult};
use crate::tools::{ToolContext, ToolRegistry};

/// Default cap on tool-calling rounds per step
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 50;

/// Characters of a raw reply quoted in a parse-failure result
const RAW_EXCERPT_CHARS: usize = 500;

/// One executed step
#[derive(Debug, Clone, PartialEq)]
pub struct StepRun {
    pub result: StepResult,
    /// Model calls made for this step
    pub rounds: u32,
    pub usage: TokenUsage,
}

/// Runs plan steps against an LLM and a tool registry
pub struct StepExecutor {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    max_tool_rounds: u32,
    max_tokens: u32,
}

impl StepExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, max_tool_rounds: u32, max_tokens: u32) -> Self {
        debug!(max_tool_rounds, max_tokens, "StepExecutor::new: called");
        Self {
            llm,
            registry,
            max_tool_rounds: max_tool_rounds.max(1),
            max_tokens,
        }
    }

    /// Execute the current plan step
    ///
    /// Appends every assistant turn and tool result to the transcript. Only
    /// LLM transport errors are returned as `Err`; everything else becomes a
    /// (possibly failed) [`StepResult`].
    pub async fn run_step(&self, state: &mut SessionState, system_prompt: &str, ctx: &ToolContext) -> Result<StepRun> {
        let step = state.current_step().unwrap_or_default().to_string();
        debug!(%step, step_index = state.step_index, "StepExecutor::run_step: called");

        let header = Message::user(format!("GOAL: {}\nCURRENT STEP: {}", state.goal, step));
        let tools = self.registry.definitions();
        let mut usage = TokenUsage::default();

        for round in 1..=self.max_tool_rounds {
            let mut context = Vec::with_capacity(state.transcript.len() + 1);
            context.push(header.clone());
            context.extend(state.transcript.iter().cloned());
            let messages = prune(&context, &mut state.tool_outputs, &state.pruning);

            let request = CompletionRequest {
                system_prompt: system_prompt.to_string(),
                messages,
                tools: tools.clone(),
                max_tokens: self.max_tokens,
            };
            let mut response = self
                .llm
                .complete(request)
                .await
                .context(format!("Executor LLM call failed (round {})", round))?;
            usage.add(&response.usage);

            if response.tool_calls.is_empty() {
                if response.stop_reason == StopReason::MaxTokens {
                    debug!(round, "StepExecutor::run_step: reply truncated, asking to continue");
                    state.transcript.push(Message::assistant(response.text_or_empty()));
                    state.transcript.push(Message::user(
                        "Continue from where you left off. Your previous response was truncated.",
                    ));
                    continue;
                }

                let text = response.text_or_empty().to_string();
                state.transcript.push(Message::assistant(text.clone()));
                let result = match parse_step_result(&text) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "Executor reply did not parse");
                        StepResult::failed(format!(
                            "Executor response parse error: {}. Raw response: {}",
                            e,
                            text.chars().take(RAW_EXCERPT_CHARS).collect::<String>()
                        ))
                    }
                };
                info!(success = result.success, rounds = round, "Step finished");
                return Ok(StepRun {
                    result,
                    rounds: round,
                    usage,
                });
            }

            assign_call_ids(&mut response.tool_calls, &state.tool_outputs);
            state.transcript.push(assistant_turn(&response));

            let results = self.registry.execute_all(&response.tool_calls, ctx).await;
            let mut blocks = Vec::with_capacity(results.len());
            for (call_id, result) in results {
                debug!(%call_id, is_error = result.is_error, len = result.content.len(), "StepExecutor::run_step: tool result");
                state.tool_outputs.put(&call_id, result.content.as_str());
                let stand_in = summarize_tool_output(&result.content, &state.pruning, &call_id);
                blocks.push(ContentBlock::tool_result(call_id, stand_in, result.is_error));
            }
            state.transcript.push(Message::user_blocks(blocks));
        }

        warn!(max_tool_rounds = self.max_tool_rounds, "Tool round cap reached without a step result");
        Ok(StepRun {
            result: StepResult::failed(format!(
                "Executor exceeded {} tool-calling rounds without returning a step result",
                self.max_tool_rounds
            )),
            rounds: self.max_tool_rounds,
            usage,
        })
    }
}

/// Give every call a store key not already taken
///
/// Empty ids and ids reused from an earlier call (in this batch or a
/// previous round) are replaced.
fn assign_call_ids(calls: &mut [ToolCall], store: &ToolOutputStore) {
    let mut seen = HashSet::with_capacity(calls.len());
    for call in calls.iter_mut() {
        if call.id.is_empty() || store.contains(&call.id) || seen.contains(&call.id) {
            let fresh = format!("call_{}", Uuid::now_v7().simple());
            debug!(old = %call.id, id = %fresh, name = %call.name, "assign_call_ids: assigned id");
            call.id = fresh;
        }
        seen.insert(call.id.clone());
    }
}

fn assistant_turn(response: &CompletionResponse) -> Message {
    let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
    if let Some(text) = response.content.as_deref().filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::text(text));
    }
    for call in &response.tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
    }
    Message::assistant_blocks(blocks)
}
