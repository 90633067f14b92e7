//! Session state threaded through every role call

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::llm::Message;
use crate::pruning::{PruningConfig, ToolOutputStore};

/// Reviewer decision on the last executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Continue,
    Retry,
    Replan,
    Finish,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Continue => "continue",
            Verdict::Retry => "retry",
            Verdict::Replan => "replan",
            Verdict::Finish => "finish",
        }
    }

    /// Upper-case form used in result lines (`RETRY: ...`)
    pub fn as_upper(&self) -> &'static str {
        match self {
            Verdict::Continue => "CONTINUE",
            Verdict::Retry => "RETRY",
            Verdict::Replan => "REPLAN",
            Verdict::Finish => "FINISH",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Verdict::Continue),
            "retry" => Ok(Verdict::Retry),
            "replan" => Ok(Verdict::Replan),
            "finish" => Ok(Verdict::Finish),
            _ => Err(s.to_string()),
        }
    }
}

/// Outcome of executing one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub output: String,
}

impl StepResult {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Parsed reviewer reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    pub verdict: Verdict,
    pub reason: String,
    pub fix_suggestion: String,
}

impl ReviewDecision {
    /// `"<VERDICT>: <reason> | <fix_suggestion>"`
    pub fn result_line(&self) -> String {
        format!("{}: {} | {}", self.verdict.as_upper(), self.reason, self.fix_suggestion)
    }
}

/// Context handed to the next planner call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingFeedback {
    /// Reviewer asked for a retry or replan
    Review(String),
    /// The step failed before review
    ExecutionFailed(String),
}

/// Everything one session knows
///
/// Created per goal and dropped when the session ends; the tool output store
/// lives exactly as long.
#[derive(Debug)]
pub struct SessionState {
    pub goal: String,
    pub plan: Vec<String>,
    pub step_index: usize,
    pub executor_output: Option<StepResult>,
    pub verdict: Option<Verdict>,
    pub last_result: Option<String>,
    pub pending_feedback: Option<PendingFeedback>,
    pub iters: u32,
    pub max_iters: u32,
    pub transcript: Vec<Message>,
    pub working_root: PathBuf,
    pub tool_outputs: ToolOutputStore,
    pub pruning: PruningConfig,
}

impl SessionState {
    pub fn new(goal: impl Into<String>, working_root: impl Into<PathBuf>, max_iters: u32, pruning: PruningConfig) -> Self {
        let goal = goal.into();
        let working_root = working_root.into();
        debug!(%goal, ?working_root, max_iters, "SessionState::new: called");
        Self {
            goal,
            plan: Vec::new(),
            step_index: 0,
            executor_output: None,
            verdict: None,
            last_result: None,
            pending_feedback: None,
            iters: 0,
            max_iters,
            transcript: Vec::new(),
            working_root,
            tool_outputs: ToolOutputStore::new(),
            pruning,
        }
    }

    /// Step the executor should work on, if a plan is active
    pub fn current_step(&self) -> Option<&str> {
        self.plan.get(self.step_index).map(String::as_str)
    }

    pub fn has_more_steps(&self) -> bool {
        self.step_index + 1 < self.plan.len()
    }

    pub fn clear_plan(&mut self) {
        debug!("SessionState::clear_plan: called");
        self.plan.clear();
        self.step_index = 0;
    }

    pub fn cap_reached(&self) -> bool {
        self.iters >= self.max_iters
    }

    /// Plan rendered as `1. step` lines
    pub fn numbered_plan(&self) -> String {
        self.plan
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parse() {
        assert_eq!("finish".parse::<Verdict>(), Ok(Verdict::Finish));
        assert_eq!(" CONTINUE\n".parse::<Verdict>(), Ok(Verdict::Continue));
        assert_eq!("RePlan".parse::<Verdict>(), Ok(Verdict::Replan));
        assert!("stop".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_verdict_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Retry).unwrap(), "\"retry\"");
        assert_eq!(Verdict::Retry.to_string(), "retry");
    }

    #[test]
    fn test_result_line() {
        let decision = ReviewDecision {
            verdict: Verdict::Retry,
            reason: "tests still fail".to_string(),
            fix_suggestion: "check imports".to_string(),
        };
        assert_eq!(decision.result_line(), "RETRY: tests still fail | check imports");
    }

    #[test]
    fn test_step_navigation() {
        let mut state = SessionState::new("goal", "/tmp/work", 5, PruningConfig::default());
        assert_eq!(state.current_step(), None);

        state.plan = vec!["one".to_string(), "two".to_string()];
        assert_eq!(state.current_step(), Some("one"));
        assert!(state.has_more_steps());
        assert_eq!(state.numbered_plan(), "1. one\n2. two");

        state.step_index = 1;
        assert!(!state.has_more_steps());

        state.clear_plan();
        assert!(state.plan.is_empty());
        assert_eq!(state.step_index, 0);
    }

    #[test]
    fn test_cap_reached() {
        let mut state = SessionState::new("goal", "/tmp/work", 2, PruningConfig::default());
        assert!(!state.cap_reached());
        state.iters = 2;
        assert!(state.cap_reached());
    }
}
