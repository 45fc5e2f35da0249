//! Gateway errors, classified for retry and logging.

use std::time::Duration;
use thiserror::Error;

/// What OpenRouter told us about a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub http_status: Option<u16>,
    /// `error.code` from the response body, e.g. "rate_limit_exceeded".
    pub provider_code: Option<String>,
    /// `x-request-id` header.
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: ErrorContext,
    },

    /// Rejected before sending (oversized prompt).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model declined to answer.
    #[error("refused: {0}")]
    Refused(String),

    /// Error status or malformed body from OpenRouter.
    #[error("openrouter error: {message}")]
    Api {
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing API key, bad header value, client build failure.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context,
        }
    }

    pub fn api(message: impl Into<String>, retryable: bool) -> Self {
        Self::Api {
            message: message.into(),
            retryable,
            context: None,
        }
    }

    /// Error statuses are retryable from 500 up.
    pub fn from_status(message: impl Into<String>, context: ErrorContext) -> Self {
        let retryable = context.http_status.is_some_and(|s| s >= 500);
        Self::Api {
            message: message.into(),
            retryable,
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidRequest(_) | Self::Refused(_) | Self::Config(_) => false,
        }
    }

    /// Short code for usage records and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Refused(_) => "refused",
            Self::Api { .. } => "api_error",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. } => Some(context),
            Self::Api { context, .. } => context.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_kind() {
        assert!(ProviderError::rate_limited(Duration::from_secs(1), ErrorContext::new())
            .is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ProviderError::api("empty response content", true).is_retryable());
        assert!(!ProviderError::api("Invalid JSON", false).is_retryable());
        assert!(!ProviderError::Refused("no".to_string()).is_retryable());
        assert!(!ProviderError::config("missing key").is_retryable());
    }

    #[test]
    fn status_decides_retry_and_keeps_context() {
        let err = ProviderError::from_status(
            "HTTP 502",
            ErrorContext::new().with_status(502).with_request_id("req-9"),
        );
        assert!(err.is_retryable());
        assert_eq!(err.code(), "api_error");
        assert_eq!(
            err.context().and_then(|c| c.request_id.as_deref()),
            Some("req-9")
        );

        let err = ProviderError::from_status("bad model", ErrorContext::new().with_status(404));
        assert!(!err.is_retryable());
    }
}
