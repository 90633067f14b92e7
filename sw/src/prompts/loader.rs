//! Prompt Loader
//!
//! Loads role prompts from override files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use chrono::Local;
use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Override directory inside a working root
pub const OVERRIDE_DIR: &str = ".stepwise/prompts";

/// The three roles of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Planner,
    Executor,
    Reviewer,
}

impl Role {
    /// Template file stem for this role
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Reviewer => "reviewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template_name())
    }
}

/// Variables available to every template
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub goal: String,
    #[serde(rename = "working-root")]
    pub working_root: String,
    pub date: String,
}

impl PromptContext {
    /// Context for a session, stamped with the local time
    pub fn new(goal: impl Into<String>, working_root: &Path) -> Self {
        Self {
            goal: goal.into(),
            working_root: working_root.display().to_string(),
            date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Loads and renders role prompts
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// `<root>/.stepwise/prompts` when it exists
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader for a working root
    pub fn new(working_root: impl AsRef<Path>) -> Self {
        let dir = working_root.as_ref().join(OVERRIDE_DIR);
        debug!(?dir, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            override_dir: dir.is_dir().then_some(dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            override_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name: override file first, then embedded
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: using override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: using embedded prompt");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render the system prompt for a role
    pub fn render(&self, role: Role, context: &PromptContext) -> Result<String> {
        let template = self.load_template(role.template_name())?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", role, e))
    }
}
