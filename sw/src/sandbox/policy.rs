//! Command policy: blocklist, allowlist, and path confinement

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use super::CommandNotAllowed;

/// Base commands an agent may run
pub const ALLOWED_COMMANDS: &[&str] = &[
    // vcs / python / build
    "git", "python", "python3", "pip", "pip3", "uv", "pytest", "mypy", "ruff", "black", "isort", "flake8",
    "pylint", "make", "cargo", "npm", "npx", "node", "yarn", "pnpm",
    // reading and inspecting
    "cat", "head", "tail", "less", "more", "wc", "diff", "ls", "find", "tree", "file", "stat",
    // searching
    "grep", "egrep", "fgrep", "rg", "ag", "ack",
    // file management
    "mkdir", "touch", "chmod", "chown", "cd", "sed", "awk", "cut", "sort", "uniq", "tr", "jq", "yq",
    // archives
    "tar", "unzip", "gzip", "gunzip",
    // shell utilities
    "echo", "printf", "true", "false", "test", "expr", "date", "env", "printenv", "which", "whereis", "type",
    "pwd", "basename", "dirname", "realpath",
];

/// Absolute paths outside the working root that commands may still name
const SAFE_PATH_PREFIXES: &[&str] = &[
    "/dev/null",
    "/dev/stdout",
    "/dev/stderr",
    "/tmp",
    "/usr/bin",
    "/usr/local/bin",
    "/bin",
];

const BLOCKED_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\brm\s+-rf\s+/", "recursive delete from /"),
    (r"\brm\s+(-[a-zA-Z]*f[a-zA-Z]*\s+)?/", "delete of an absolute path"),
    (r">\s*/dev/sd[a-z]", "raw device write"),
    (r"\bdd\b.*of=/dev/", "raw device write"),
    (r"\bmkfs\b", "filesystem format"),
    (r"\b(sudo|su|doas)\b", "privilege escalation"),
    (r"\bchmod\s+[0-7]*777\b", "world-writable permissions"),
    (r"\bchown\b.*root", "ownership change to root"),
    (r"\b(curl|wget|nc|netcat|ncat)\b", "network tool"),
    (r"\b(ssh|scp|rsync|ftp|sftp|telnet)\b", "remote access tool"),
    (r"\beval\b", "eval"),
    (r"`.*`", "command substitution"),
    (r"\$\(.*\)", "command substitution"),
    (r"\|\s*(sh|bash|zsh)\b", "pipe into a shell"),
    (r"(;|&&)\s*(sh|bash|zsh)\b", "chained shell"),
    (r"\bexport\b.*\bPATH\b", "PATH manipulation"),
    (r"\bsource\b", "sourcing a script"),
    (r"(^|[;&|]\s*)\.\s+\S", "sourcing a script"),
    (r"/etc/(passwd|shadow|sudoers)", "sensitive system file"),
    (r"~/\.ssh", "ssh key access"),
    (r"\bHOME=", "HOME reassignment"),
    (r"\bkill\b.*-9", "process kill"),
    (r"\b(pkill|killall)\b", "process kill"),
    (r"\b(nohup|disown)\b", "detached process"),
    (r"(^|[^&>])&([^&>]|$)", "backgrounding"),
];

struct BlockedPattern {
    regex: Regex,
    reason: &'static str,
}

fn blocked_patterns() -> &'static [BlockedPattern] {
    static PATTERNS: OnceLock<Vec<BlockedPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BLOCKED_PATTERNS
            .iter()
            .filter_map(|(pattern, reason)| Regex::new(pattern).ok().map(|regex| BlockedPattern { regex, reason }))
            .collect()
    })
}

/// Validate a command against the policy
///
/// `root` is the working root; `cwd` is where the command will run and is
/// used to resolve relative `..` arguments.
pub fn check_command(command: &str, root: &Path, cwd: &Path) -> Result<(), CommandNotAllowed> {
    debug!(%command, ?root, ?cwd, "check_command: called");
    let deny = |reason: String| CommandNotAllowed::new(command, reason);

    if command.trim().is_empty() {
        return Err(deny("empty command".to_string()));
    }

    if let Some(hit) = blocked_patterns().iter().find(|p| p.regex.is_match(command)) {
        debug!(reason = hit.reason, "check_command: blocklist match");
        return Err(deny(format!("matches blocked pattern ({})", hit.reason)));
    }

    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let roots = [root, canonical_root.as_path()];

    for segment in split_segments(command) {
        let tokens = tokenize(&segment);
        let Some((base_idx, base)) = locate_base(&tokens) else {
            continue;
        };
        if !ALLOWED_COMMANDS.contains(&base.as_str()) {
            debug!(%base, "check_command: base command not allowed");
            return Err(deny(format!("command '{}' is not in the allowed command list", base)));
        }
        let args = &tokens[base_idx + 1..];
        if base == "cd" && matches!(args.first().map(String::as_str), None | Some("-")) {
            return Err(deny("'cd' without a directory leaves the working root".to_string()));
        }
        for token in args {
            check_path_token(token, &roots, cwd).map_err(deny)?;
        }
    }

    debug!("check_command: allowed");
    Ok(())
}

/// Split a command line into simple-command segments
///
/// Separators are `;`, newline, `|`, `||`, `&`, and `&&` outside quotes.
/// `&` that is part of a redirection (`2>&1`, `&>file`) does not split.
pub fn split_segments(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let (mut in_single, mut in_double, mut escaped) = (false, false, false);

    for (i, &c) in chars.iter().enumerate() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' if !in_single => {
                escaped = true;
                current.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            ';' | '\n' | '|' if !in_single && !in_double => {
                segments.push(std::mem::take(&mut current));
            }
            '&' if !in_single && !in_double => {
                let prev = if i > 0 { chars.get(i - 1).copied() } else { None };
                let next = chars.get(i + 1).copied();
                if matches!(prev, Some('>') | Some('<')) || next == Some('>') {
                    current.push(c);
                } else {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Normalized base command of one segment
///
/// Leading `VAR=value` assignments and an `env [VAR=value...]` prefix are
/// skipped, directories are stripped, and versioned interpreters such as
/// `python3.11` collapse to `python3`.
pub fn base_command(segment: &str) -> Option<String> {
    let tokens = tokenize(segment);
    locate_base(&tokens).map(|(_, base)| base)
}

fn tokenize(segment: &str) -> Vec<String> {
    shlex::split(segment).unwrap_or_else(|| segment.split_whitespace().map(String::from).collect())
}

fn locate_base(tokens: &[String]) -> Option<(usize, String)> {
    let mut idx = 0;
    while idx < tokens.len() && is_assignment(&tokens[idx]) {
        idx += 1;
    }
    if tokens.get(idx).map(String::as_str) == Some("env") {
        let env_idx = idx;
        idx += 1;
        while idx < tokens.len() && (is_assignment(&tokens[idx]) || tokens[idx].starts_with('-')) {
            idx += 1;
        }
        if idx >= tokens.len() {
            return Some((env_idx, "env".to_string()));
        }
    }
    let word = tokens.get(idx)?;
    let name = Path::new(word)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| word.clone());
    Some((idx, normalize_interpreter(&name)))
}

fn is_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

fn normalize_interpreter(name: &str) -> String {
    let versioned = |rest: &str| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.');
    if let Some(rest) = name.strip_prefix("python3.")
        && versioned(rest)
    {
        return "python3".to_string();
    }
    if name == "python2" || name.strip_prefix("python2.").is_some_and(versioned) {
        return "python".to_string();
    }
    name.to_string()
}

fn check_path_token(token: &str, roots: &[&Path], cwd: &Path) -> Result<(), String> {
    // redirections carry the path after the operator
    let mut candidate = match token.rfind(['<', '>']) {
        Some(pos) => &token[pos + 1..],
        None => token,
    };
    if candidate.starts_with('-')
        && let Some((_, value)) = candidate.split_once('=')
    {
        candidate = value;
    }
    if candidate.is_empty() {
        return Ok(());
    }

    let inside = |p: &Path| roots.iter().any(|r| p.starts_with(r));

    let expanded = expand_home(candidate)?;
    let candidate = expanded.as_deref().unwrap_or(candidate);

    if candidate.starts_with('/') {
        let resolved = normalize_path(Path::new(candidate));
        if inside(&resolved) || SAFE_PATH_PREFIXES.iter().any(|safe| resolved.starts_with(safe)) {
            return Ok(());
        }
        return Err(format!("path '{}' is outside the working root", candidate));
    }

    if candidate.contains("..") {
        let resolved = normalize_path(&cwd.join(candidate));
        if !inside(&resolved) {
            return Err(format!("path '{}' escapes the working root", candidate));
        }
    }

    Ok(())
}

/// Rewrite a leading `~`, `$HOME` or `${HOME}` to the home directory
///
/// Any other leading variable used as a path prefix cannot be resolved
/// here and is refused.
fn expand_home(candidate: &str) -> Result<Option<String>, String> {
    let rest = if let Some(rest) = candidate.strip_prefix('~') {
        if !(rest.is_empty() || rest.starts_with('/')) {
            return Err(format!("path '{}' names another user's home", candidate));
        }
        rest
    } else if let Some(rest) = candidate.strip_prefix("${HOME}") {
        rest
    } else if let Some(rest) = candidate.strip_prefix("$HOME")
        && (rest.is_empty() || rest.starts_with('/'))
    {
        rest
    } else {
        if let Some(var) = candidate.strip_prefix('$')
            && var.contains('/')
        {
            return Err(format!("path '{}' goes through a shell variable", candidate));
        }
        return Ok(None);
    };

    let home = dirs::home_dir().ok_or_else(|| format!("path '{}' needs a home directory", candidate))?;
    Ok(Some(format!("{}{}", home.display(), rest)))
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
