//! The sum type every core operation returns through. Kept narrow and
//! exhaustively matched by `services/api` rather than sniffed by message —
//! mirrors the teacher's `ApiError`/`IntoResponse` split of "what failed"
//! from "how we tell the caller about it".

use thiserror::Error;

/// Design-level error kinds from spec.md §7.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service not found: {0}")]
    NotFound(String),

    #[error("graph provider unreachable: {0}")]
    ProviderUnavailable(String),

    #[error("graph provider request timed out after {timeout_ms}ms")]
    ProviderTimeout { timeout_ms: u64 },

    #[error("graph provider returned HTTP {status}: {message}")]
    ProviderUpstreamError { status: u16, message: String },

    #[error("failed to decode graph provider payload: {0}")]
    DecodeError(String),

    #[error("simulation exceeded its {timeout_ms}ms deadline")]
    SimulationTimeout { timeout_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Redacts anything that looks like it could carry a credential before
    /// the message reaches a log line or an HTTP error body (§7 "Credentials
    /// must never appear in error messages or logs").
    pub fn redacted_message(&self) -> String {
        redact(&self.to_string())
    }
}

/// Strips query-string and common auth-header-shaped substrings. Narrow by
/// design: the adapter only ever forwards a base URL plus a handful of
/// known-shape headers, so a small set of patterns covers every real case.
fn redact(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for token in input.split_inclusive(' ') {
        let lower = token.to_ascii_lowercase();
        if lower.contains("authorization")
            || lower.contains("token=")
            || lower.contains("apikey")
            || lower.contains("api_key")
            || lower.contains("password")
        {
            out.push_str("[redacted] ");
        } else if let Some(idx) = token.find('?') {
            out.push_str(&token[..idx]);
            out.push_str("[redacted] ");
        } else {
            out.push_str(token);
        }
    }
    out.trim_end().to_string()
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_query_strings() {
        let msg = redact("GET http://provider/graph/health?token=abc123 failed");
        assert!(!msg.contains("abc123"));
        assert!(msg.contains("[redacted]"));
    }

    #[test]
    fn redacts_authorization_mentions() {
        let msg = redact("header Authorization: Bearer xyz rejected");
        assert!(!msg.contains("xyz"));
    }
}
