//! LLM error types and retry classification

use std::time::Duration;
use thiserror::Error;

/// First backoff step; doubles on every further attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Longest `retry-after` honoured before retrying a rate-limited call
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Errors from one completion call
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// Statuses worth another attempt: timeout, rate limit, 5xx, overloaded
pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

impl LlmError {
    /// Whether the client should try the same request again
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) => true,
            LlmError::Api { status, .. } => is_transient_status(*status),
            LlmError::InvalidResponse(_) | LlmError::MissingApiKey(_) | LlmError::UnsupportedProvider(_) => false,
        }
    }

    /// Wait before retry number `attempt` (1-based)
    ///
    /// Rate limits wait what the server asked for, capped; everything else
    /// backs off exponentially.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self {
            LlmError::RateLimited { retry_after } => (*retry_after).min(MAX_RATE_LIMIT_WAIT),
            _ => INITIAL_BACKOFF * 2u32.pow(attempt.saturating_sub(1).min(6)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let overloaded = LlmError::Api {
            status: 529,
            message: "Overloaded".to_string(),
        };
        let bad_request = LlmError::Api {
            status: 400,
            message: "Bad request".to_string(),
        };

        assert!(overloaded.is_transient());
        assert!(!bad_request.is_transient());
        assert!(LlmError::RateLimited { retry_after: Duration::from_secs(5) }.is_transient());
        assert!(!LlmError::InvalidResponse("truncated JSON".to_string()).is_transient());
        assert!(!LlmError::MissingApiKey("ANTHROPIC_API_KEY".to_string()).is_transient());
    }

    #[test]
    fn test_transient_statuses() {
        for status in [408, 429, 500, 502, 503, 504, 529] {
            assert!(is_transient_status(status), "{}", status);
        }
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn test_backoff_doubles() {
        let err = LlmError::Api {
            status: 503,
            message: String::new(),
        };
        assert_eq!(err.backoff(1), Duration::from_millis(1000));
        assert_eq!(err.backoff(2), Duration::from_millis(2000));
        assert_eq!(err.backoff(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_rate_limit_wait_is_capped() {
        let short = LlmError::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        let long = LlmError::RateLimited {
            retry_after: Duration::from_secs(600),
        };
        assert_eq!(short.backoff(1), Duration::from_secs(3));
        assert_eq!(long.backoff(1), MAX_RATE_LIMIT_WAIT);
    }
}
