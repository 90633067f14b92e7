//! Controller - verdict-driven state machine for one session
//!
//! ```text
//! Planning ──(non-empty plan)──▶ Executing ──(success)──▶ Reviewing ──▶ Advancing
//!    ▲  │                           │                                   │
//!    │  └─(empty plan)─▶ Terminal    └─(failure, fast-fail)─▶ Planning    ├─ finish ───────────▶ Terminal
//!    │                                                                  ├─ continue, more ───▶ Executing (next step)
//!    │                                                                  ├─ continue, last ───▶ Terminal (implicit finish)
//!    └──────────────────────────────────────────────────── retry/replan ┘
//! ```
//!
//! Every Advancing check and every fast-fail consumes one iteration; once
//! `iters` reaches `max_iters` the session ends with
//! [`SessionOutcome::IterationCapReached`].

use std::fmt;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::executor::StepExecutor;
use crate::llm::{CompletionRequest, LlmClient, Message, TokenUsage};
use crate::parse::{parse_plan, parse_verdict};
use crate::prompts::{PromptContext, PromptLoader, Role};
use crate::session::{PendingFeedback, ReviewDecision, SessionState, Verdict};
use crate::tools::{ToolContext, ToolRegistry};

/// Where the Advancing phase sent the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Planning,
    /// Next plan step, 1-based
    Step(usize),
    Terminal,
}

/// One visited state, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Planning,
    /// Executing a plan step, 1-based
    Executing(usize),
    Reviewing,
    Advancing { verdict: Verdict, to: Destination },
}

impl fmt::Display for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visit::Planning => write!(f, "Planning"),
            Visit::Executing(step) => write!(f, "Executing(step {})", step),
            Visit::Reviewing => write!(f, "Reviewing"),
            Visit::Advancing { verdict, to } => match to {
                Destination::Planning => write!(f, "Advancing({}→Planning)", verdict),
                Destination::Step(step) => write!(f, "Advancing({}→step {})", verdict, step),
                Destination::Terminal => write!(f, "Advancing({}→Terminal)", verdict),
            },
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Reviewer said finish, or continued past the last step (`implicit`)
    Finished { summary: String, implicit: bool },
    /// The iteration ceiling stopped the session
    IterationCapReached { iters: u32, max_iters: u32 },
    /// The planner produced no steps
    EmptyPlan,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Finished { summary, implicit: false } => write!(f, "Finished: {}", summary),
            SessionOutcome::Finished { summary, implicit: true } => {
                write!(f, "Finished (plan exhausted): {}", summary)
            }
            SessionOutcome::IterationCapReached { iters, max_iters } => {
                write!(f, "Incomplete, iteration cap reached ({}/{})", iters, max_iters)
            }
            SessionOutcome::EmptyPlan => write!(f, "Stopped: the planner produced an empty plan"),
        }
    }
}

/// Result of [`Controller::run`]
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub iters: u32,
    pub trace: Vec<Visit>,
    pub usage: TokenUsage,
}

impl SessionReport {
    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Finished { .. })
    }
}

enum Phase {
    Planning,
    Executing,
    Reviewing,
    Advancing(ReviewDecision),
}

struct SystemPrompts {
    planner: String,
    executor: String,
    reviewer: String,
}

/// Sequences planner, executor and reviewer calls over one session state
pub struct Controller {
    llm: Arc<dyn LlmClient>,
    executor: StepExecutor,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl Controller {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        prompts: PromptLoader,
        session: &SessionConfig,
    ) -> Self {
        debug!(?session, "Controller::new: called");
        let executor = StepExecutor::new(llm.clone(), registry, session.max_tool_rounds, session.max_tokens);
        Self {
            llm,
            executor,
            prompts,
            max_tokens: session.max_tokens,
        }
    }

    /// Drive the session until finish, empty plan, or the iteration cap
    ///
    /// Malformed role replies never end a session; only LLM transport errors
    /// (after the client's own retries) and prompt rendering errors do.
    pub async fn run(&self, state: &mut SessionState, ctx: &ToolContext) -> Result<SessionReport> {
        info!(goal = %state.goal, max_iters = state.max_iters, "Session started");
        let prompts = self.render_prompts(state)?;
        let mut trace = Vec::new();
        let mut usage = TokenUsage::default();
        let mut phase = Phase::Planning;

        let outcome = loop {
            phase = match phase {
                Phase::Planning => {
                    trace.push(Visit::Planning);
                    self.plan(state, &prompts.planner, &mut usage).await?;
                    if state.plan.is_empty() {
                        warn!("Planner produced an empty plan");
                        break SessionOutcome::EmptyPlan;
                    }
                    Phase::Executing
                }
                Phase::Executing => {
                    trace.push(Visit::Executing(state.step_index + 1));
                    let run = self.executor.run_step(state, &prompts.executor, ctx).await?;
                    usage.add(&run.usage);
                    state.last_result = Some(run.result.output.clone());
                    let success = run.result.success;
                    state.executor_output = Some(run.result);

                    if success {
                        Phase::Reviewing
                    } else {
                        state.iters += 1;
                        let output = state.last_result.clone().unwrap_or_default();
                        info!(iters = state.iters, "Step failed, replanning without review");
                        state.pending_feedback = Some(PendingFeedback::ExecutionFailed(output));
                        state.clear_plan();
                        if state.cap_reached() {
                            break self.cap_reached(state);
                        }
                        Phase::Planning
                    }
                }
                Phase::Reviewing => {
                    trace.push(Visit::Reviewing);
                    let decision = self.review(state, &prompts.reviewer, &mut usage).await?;
                    Phase::Advancing(decision)
                }
                Phase::Advancing(decision) => {
                    let (to, next, outcome) = self.advance(state, &decision);
                    trace.push(Visit::Advancing {
                        verdict: decision.verdict,
                        to,
                    });
                    if let Some(outcome) = outcome {
                        break outcome;
                    }
                    next
                }
            };
        };

        info!(outcome = %outcome, iters = state.iters, "Session ended");
        Ok(SessionReport {
            outcome,
            iters: state.iters,
            trace,
            usage,
        })
    }

    fn render_prompts(&self, state: &SessionState) -> Result<SystemPrompts> {
        let context = PromptContext::new(state.goal.clone(), &state.working_root);
        Ok(SystemPrompts {
            planner: self.prompts.render(Role::Planner, &context)?,
            executor: self.prompts.render(Role::Executor, &context)?,
            reviewer: self.prompts.render(Role::Reviewer, &context)?,
        })
    }

    async fn ask(&self, system_prompt: &str, user: String, usage: &mut TokenUsage, role: Role) -> Result<String> {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: vec![Message::user(user)],
            tools: vec![],
            max_tokens: self.max_tokens,
        };
        let response = self
            .llm
            .complete(request)
            .await
            .context(format!("{} LLM call failed", role))?;
        usage.add(&response.usage);
        Ok(response.text_or_empty().to_string())
    }

    /// Planning: consume pending feedback, replace the plan
    async fn plan(&self, state: &mut SessionState, system_prompt: &str, usage: &mut TokenUsage) -> Result<()> {
        debug!(iters = state.iters, "Controller::plan: called");
        let hint = match state.pending_feedback.take() {
            Some(PendingFeedback::Review(line)) => format!("\nPrevious feedback: {}\n", line),
            Some(PendingFeedback::ExecutionFailed(output)) => format!("\nPrevious execution failed: {}\n", output),
            None => String::new(),
        };
        let prompt = format!("GOAL: {}{}\nCreate/adjust the plan.", state.goal, hint);

        let reply = self.ask(system_prompt, prompt, usage, Role::Planner).await?;
        state.plan = match parse_plan(&reply) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Planner reply did not parse, running it as a single step");
                vec![format!("Parse failure in planner ({}). Executing directly: {}", e, reply)]
            }
        };
        state.step_index = 0;
        state.transcript.push(Message::assistant(reply));
        info!(steps = state.plan.len(), "Plan ready");
        Ok(())
    }

    /// Reviewing: ask for a verdict on the last result
    async fn review(
        &self,
        state: &mut SessionState,
        system_prompt: &str,
        usage: &mut TokenUsage,
    ) -> Result<ReviewDecision> {
        debug!(step_index = state.step_index, "Controller::review: called");
        let prompt = format!(
            "GOAL: {}\nPLAN:\n{}\nCURRENT STEP: {} of {}\nLAST RESULT:\n{}\n\n\
             Decide if the step was successful or if we need to retry/replan.",
            state.goal,
            state.numbered_plan(),
            state.step_index + 1,
            state.plan.len(),
            state.last_result.as_deref().unwrap_or("(none)")
        );

        let reply = self.ask(system_prompt, prompt, usage, Role::Reviewer).await?;
        let decision = match parse_verdict(&reply) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Reviewer reply did not parse, defaulting to retry");
                ReviewDecision {
                    verdict: Verdict::Retry,
                    reason: format!("Reviewer JSON parse failed: {}", e),
                    fix_suggestion: "Check the last output and try again.".to_string(),
                }
            }
        };

        state.verdict = Some(decision.verdict);
        state.last_result = Some(decision.result_line());
        state.transcript.push(Message::assistant(reply));
        info!(verdict = %decision.verdict, reason = %decision.reason, "Review verdict");
        Ok(decision)
    }

    /// Advancing: count the iteration and route on the verdict
    ///
    /// Finishing is checked before the iteration cap.
    fn advance(&self, state: &mut SessionState, decision: &ReviewDecision) -> (Destination, Phase, Option<SessionOutcome>) {
        state.iters += 1;
        debug!(iters = state.iters, verdict = %decision.verdict, "Controller::advance: called");

        match decision.verdict {
            Verdict::Finish => (Destination::Terminal, Phase::Planning, Some(finished(state, decision, false))),
            Verdict::Continue if !state.has_more_steps() => {
                info!("Last step accepted, finishing");
                (Destination::Terminal, Phase::Planning, Some(finished(state, decision, true)))
            }
            _ if state.cap_reached() => (Destination::Terminal, Phase::Planning, Some(self.cap_reached(state))),
            Verdict::Continue => {
                state.step_index += 1;
                (Destination::Step(state.step_index + 1), Phase::Executing, None)
            }
            Verdict::Retry | Verdict::Replan => {
                state.pending_feedback = Some(PendingFeedback::Review(decision.result_line()));
                state.clear_plan();
                (Destination::Planning, Phase::Planning, None)
            }
        }
    }

    fn cap_reached(&self, state: &SessionState) -> SessionOutcome {
        warn!(iters = state.iters, max_iters = state.max_iters, "Iteration cap reached");
        SessionOutcome::IterationCapReached {
            iters: state.iters,
            max_iters: state.max_iters,
        }
    }
}

/// Summary is the reviewer's reason, or the last executor output when empty
fn finished(state: &SessionState, decision: &ReviewDecision, implicit: bool) -> SessionOutcome {
    let summary = if decision.reason.is_empty() {
        state
            .executor_output
            .as_ref()
            .map(|r| r.output.clone())
            .unwrap_or_default()
    } else {
        decision.reason.clone()
    };
    SessionOutcome::Finished { summary, implicit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::pruning::PruningConfig;
    use tempfile::tempdir;

    const STEP_OK: &str = r#"{"success": true, "output": "step done"}"#;
    const STEP_FAILED: &str = r#"{"success": false, "output": "ImportError: no module named foo"}"#;

    fn plan(steps: &[&str]) -> String {
        serde_json::json!({ "plan": steps }).to_string()
    }

    fn verdict(v: &str) -> String {
        format!(r#"{{"verdict": "{}", "reason": "because {}", "fix_suggestion": "fix {}"}}"#, v, v, v)
    }

    fn controller(llm: Arc<MockLlmClient>) -> Controller {
        Controller::new(
            llm,
            Arc::new(ToolRegistry::standard()),
            PromptLoader::embedded_only(),
            &SessionConfig::default(),
        )
    }

    async fn run(script: Vec<String>, max_iters: u32) -> (SessionReport, SessionState, Arc<MockLlmClient>) {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());
        let mut state = SessionState::new("ship it", temp.path(), max_iters, PruningConfig::default());
        let texts: Vec<&str> = script.iter().map(String::as_str).collect();
        let llm = Arc::new(MockLlmClient::from_texts(&texts));

        let report = controller(llm.clone()).run(&mut state, &ctx).await.unwrap();
        (report, state, llm)
    }

    #[tokio::test]
    async fn test_verdict_sequence_trace() {
        let two_steps = plan(&["first", "second"]);
        let script = vec![
            two_steps.clone(),
            STEP_OK.to_string(),
            verdict("retry"),
            two_steps.clone(),
            STEP_OK.to_string(),
            verdict("replan"),
            two_steps,
            STEP_OK.to_string(),
            verdict("continue"),
            STEP_OK.to_string(),
            verdict("finish"),
        ];

        let (report, state, llm) = run(script, 10).await;

        assert_eq!(
            report.trace,
            vec![
                Visit::Planning,
                Visit::Executing(1),
                Visit::Reviewing,
                Visit::Advancing { verdict: Verdict::Retry, to: Destination::Planning },
                Visit::Planning,
                Visit::Executing(1),
                Visit::Reviewing,
                Visit::Advancing { verdict: Verdict::Replan, to: Destination::Planning },
                Visit::Planning,
                Visit::Executing(1),
                Visit::Reviewing,
                Visit::Advancing { verdict: Verdict::Continue, to: Destination::Step(2) },
                Visit::Executing(2),
                Visit::Reviewing,
                Visit::Advancing { verdict: Verdict::Finish, to: Destination::Terminal },
            ]
        );
        assert_eq!(
            report.outcome,
            SessionOutcome::Finished {
                summary: "because finish".to_string(),
                implicit: false
            }
        );
        assert_eq!(report.iters, 4);
        assert_eq!(state.verdict, Some(Verdict::Finish));
        assert_eq!(llm.call_count(), 11);
    }

    #[tokio::test]
    async fn test_retry_feedback_reaches_planner() {
        let script = vec![
            plan(&["only"]),
            STEP_OK.to_string(),
            verdict("retry"),
            plan(&["only"]),
            STEP_OK.to_string(),
            verdict("finish"),
        ];

        let (_, _, llm) = run(script, 10).await;

        let requests = llm.requests();
        let first = requests[0].messages[0].content.as_text().unwrap();
        assert_eq!(first, "GOAL: ship it\nCreate/adjust the plan.");
        let replan = requests[3].messages[0].content.as_text().unwrap();
        assert_eq!(
            replan,
            "GOAL: ship it\nPrevious feedback: RETRY: because retry | fix retry\n\nCreate/adjust the plan."
        );
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_continue_on_last_step_is_implicit_finish() {
        let script = vec![plan(&["only"]), STEP_OK.to_string(), verdict("continue")];

        let (report, _, _) = run(script, 10).await;

        assert_eq!(
            report.trace.last(),
            Some(&Visit::Advancing {
                verdict: Verdict::Continue,
                to: Destination::Terminal
            })
        );
        assert!(matches!(report.outcome, SessionOutcome::Finished { implicit: true, .. }));
    }

    #[tokio::test]
    async fn test_failed_step_skips_review() {
        let script = vec![
            plan(&["install", "test"]),
            STEP_FAILED.to_string(),
            plan(&["fix import"]),
            STEP_OK.to_string(),
            verdict("finish"),
        ];

        let (report, _, llm) = run(script, 10).await;

        assert_eq!(
            &report.trace[..4],
            &[Visit::Planning, Visit::Executing(1), Visit::Planning, Visit::Executing(1)]
        );
        assert_eq!(report.iters, 2);
        let replan = llm.requests()[2].messages[0].content.as_text().unwrap().to_string();
        assert!(replan.contains("Previous execution failed: ImportError: no module named foo"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let script = vec![
            plan(&["a"]),
            STEP_OK.to_string(),
            verdict("retry"),
            plan(&["a"]),
            STEP_OK.to_string(),
            verdict("retry"),
        ];

        let (report, _, llm) = run(script, 2).await;

        assert_eq!(report.outcome, SessionOutcome::IterationCapReached { iters: 2, max_iters: 2 });
        assert_eq!(
            report.trace.last(),
            Some(&Visit::Advancing {
                verdict: Verdict::Retry,
                to: Destination::Terminal
            })
        );
        assert_eq!(llm.call_count(), 6);
    }

    #[tokio::test]
    async fn test_fast_fail_honours_cap() {
        let script = vec![plan(&["a"]), STEP_FAILED.to_string()];

        let (report, _, _) = run(script, 1).await;

        assert_eq!(report.outcome, SessionOutcome::IterationCapReached { iters: 1, max_iters: 1 });
    }

    #[tokio::test]
    async fn test_finish_wins_over_cap() {
        let script = vec![plan(&["a", "b"]), STEP_OK.to_string(), verdict("finish")];

        let (report, _, _) = run(script, 1).await;

        assert!(report.is_finished());
    }

    #[tokio::test]
    async fn test_empty_plan_terminates() {
        let (report, _, llm) = run(vec![plan(&[])], 10).await;

        assert_eq!(report.outcome, SessionOutcome::EmptyPlan);
        assert_eq!(report.trace, vec![Visit::Planning]);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_replies_degrade() {
        let script = vec![
            "I think we should just do it".to_string(),
            STEP_OK.to_string(),
            "looks good to me!".to_string(),
            plan(&["again"]),
            STEP_OK.to_string(),
            verdict("finish"),
        ];

        let (report, _, llm) = run(script, 10).await;

        assert!(report.is_finished());
        let requests = llm.requests();
        let step = requests[1].messages[0].content.as_text().unwrap();
        assert!(step.contains("CURRENT STEP: Parse failure in planner ("));
        assert!(step.ends_with("Executing directly: I think we should just do it"));

        let replan = requests[3].messages[0].content.as_text().unwrap();
        assert!(replan.contains("Previous feedback: RETRY: Reviewer JSON parse failed: "));
        assert!(replan.contains("| Check the last output and try again."));
    }

    #[tokio::test]
    async fn test_transport_error_aborts() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());
        let mut state = SessionState::new("ship it", temp.path(), 5, PruningConfig::default());
        let llm = Arc::new(MockLlmClient::new(vec![]));

        assert!(controller(llm).run(&mut state, &ctx).await.is_err());
    }

    #[test]
    fn test_visit_display() {
        let visit = Visit::Advancing {
            verdict: Verdict::Continue,
            to: Destination::Step(2),
        };
        assert_eq!(visit.to_string(), "Advancing(continue→step 2)");
        assert_eq!(Visit::Executing(1).to_string(), "Executing(step 1)");
    }
}
