//! Bounded retry of known-transient driver failures.
//!
//! Only a closed set of error signatures is retried, at most `max_retries`
//! extra attempts. Every retry produces a timestamped `RetryEvent` and a
//! `warn!` line, so retries always show up in the audit trail. Anything else
//! fails on the first attempt.

use std::fmt;

use chrono::{DateTime, Utc};
use hush_browser::PageError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Recognised transient failure signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientSignature {
    ElementDetached,
    ElementNotAttached,
    NotClickable,
    NavigationTimeout,
    NetworkTimeout,
}

impl TransientSignature {
    /// Match a driver error message against the known signatures.
    pub fn classify(message: &str) -> Option<Self> {
        let m = message.to_ascii_lowercase();
        if m.contains("detached") {
            Some(TransientSignature::ElementDetached)
        } else if m.contains("not attached") {
            Some(TransientSignature::ElementNotAttached)
        } else if m.contains("not clickable") || m.contains("intercepts pointer events") {
            Some(TransientSignature::NotClickable)
        } else if m.contains("navigation timeout") || m.contains("navigation timed out") {
            Some(TransientSignature::NavigationTimeout)
        } else if m.contains("net::err_timed_out") || m.contains("network timeout") {
            Some(TransientSignature::NetworkTimeout)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransientSignature::ElementDetached => "element_detached",
            TransientSignature::ElementNotAttached => "element_not_attached",
            TransientSignature::NotClickable => "not_clickable",
            TransientSignature::NavigationTimeout => "navigation_timeout",
            TransientSignature::NetworkTimeout => "network_timeout",
        }
    }
}

impl fmt::Display for TransientSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata for one retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEvent {
    /// The retried operation, e.g. `perform`.
    pub operation: String,
    /// Selector or trace the operation acted on.
    pub subject: String,
    /// 1-based number of the retry (attempt 1 is the first retry).
    pub attempt: u32,
    pub signature: TransientSignature,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decide whether a failure should be retried.
    ///
    /// `retries_so_far` is how many retries of this operation already ran.
    /// Returns the event to record when a retry is granted.
    pub fn on_failure(
        &self,
        operation: &str,
        subject: &str,
        retries_so_far: u32,
        err: &PageError,
    ) -> Option<RetryEvent> {
        if err.is_session_fatal() || retries_so_far >= self.max_retries {
            return None;
        }
        let signature = TransientSignature::classify(err.message())?;
        let attempt = retries_so_far + 1;
        warn!(
            operation,
            subject,
            attempt,
            max = self.max_retries,
            signature = %signature,
            "retrying transient failure"
        );
        Some(RetryEvent {
            operation: operation.to_string(),
            subject: subject.to_string(),
            attempt,
            signature,
            at: Utc::now(),
        })
    }
}
