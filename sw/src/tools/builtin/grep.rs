//! grep tool - search files using the ripgrep libraries

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use grep_matcher::Matcher;
use grep_regex::RegexMatcherBuilder;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use serde_json::{Value, json};
use tracing::debug;
use walkdir::WalkDir;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Directories never worth searching
const SKIP_DIRS: &[&str] = &[".git", ".venv", "node_modules", "__pycache__", "target"];

/// Search for a regex in files, with context lines
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search for a regex in files under the working root. Returns matching lines with context."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: '.')"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob to filter file names (e.g. '*.py')"
                },
                "context_lines": {
                    "type": "integer",
                    "description": "Context lines before and after each match (default: 2)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Case-insensitive search (default: false)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of matching lines (default: 50)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GrepTool::execute: called");
        let pattern = match require_str(&input, "pattern") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = input["path"].as_str().unwrap_or(".");
        let file_pattern = input["file_pattern"].as_str();
        let context_lines = input["context_lines"].as_u64().unwrap_or(2) as usize;
        let case_insensitive = input["case_insensitive"].as_bool().unwrap_or(false);
        let max_results = input["max_results"].as_u64().unwrap_or(50) as usize;

        let search_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        let matcher = match RegexMatcherBuilder::new()
            .case_insensitive(case_insensitive)
            .build(pattern)
        {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("Invalid regex pattern: {}", e)),
        };

        let glob_matcher = file_pattern.and_then(|fp| glob::Pattern::new(fp).ok());

        let files: Vec<PathBuf> = if search_path.is_file() {
            vec![search_path.clone()]
        } else {
            WalkDir::new(&search_path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0 || !(e.file_type().is_dir() && SKIP_DIRS.iter().any(|d| e.file_name() == *d))
                })
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| match &glob_matcher {
                    Some(glob) => e.file_name().to_str().is_some_and(|name| glob.matches(name)),
                    None => true,
                })
                .map(|e| e.into_path())
                .collect()
        };
        debug!(file_count = %files.len(), "GrepTool::execute: files to search");

        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .before_context(context_lines)
            .after_context(context_lines)
            .build();

        let mut results: Vec<MatchResult> = Vec::new();
        let mut match_count = 0usize;

        for file_path in files {
            if match_count >= max_results {
                break;
            }
            let display_path = ctx.display_path(&file_path);

            let search_result = searcher.search_path(
                &matcher,
                &file_path,
                UTF8(|line_num, line| {
                    if match_count >= max_results {
                        return Ok(false);
                    }
                    let is_match = matcher.is_match(line.as_bytes()).unwrap_or(false);
                    results.push(MatchResult {
                        file: display_path.clone(),
                        line_num,
                        line: line.trim_end().to_string(),
                        is_context: !is_match,
                    });
                    if is_match {
                        match_count += 1;
                    }
                    Ok(true)
                }),
            );

            if let Err(e) = search_result {
                debug!(?file_path, %e, "GrepTool::execute: skipping file");
            }
        }

        if results.is_empty() {
            return ToolResult::success("No matches found.");
        }
        ToolResult::success(format_results(&results, max_results))
    }
}

#[derive(Debug)]
struct MatchResult {
    file: String,
    line_num: u64,
    line: String,
    is_context: bool,
}

/// `file:N:line` for matches, `file-N-line` for context, blank line between files
fn format_results(results: &[MatchResult], max_results: usize) -> String {
    let mut output = String::new();
    let mut current_file = "";
    let mut match_count = 0;

    for result in results {
        if result.file != current_file {
            if !current_file.is_empty() {
                output.push('\n');
            }
            current_file = &result.file;
        }

        let separator = if result.is_context { "-" } else { ":" };
        output.push_str(&format!(
            "{}{}{}{}{}\n",
            result.file, separator, result.line_num, separator, result.line
        ));

        if !result.is_context {
            match_count += 1;
        }
    }

    if match_count >= max_results {
        output.push_str(&format!("\n... (truncated at {} matches)", max_results));
    }

    output.trim_end().to_string()
}
