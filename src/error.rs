//! Error taxonomy for provider calls and session transitions.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure of a call to the external prompt-execution service.
/// Transport problems and unusable output are reported the same way to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
  #[error("AI provider is not configured")]
  Unavailable,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("provider HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("unusable provider output: {0}")]
  Malformed(String),
}

/// Asynchronous phase a session can be waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Generation,
  Grading,
  Solution,
  Hint,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Generation => "generation",
      Phase::Grading => "grading",
      Phase::Solution => "solution",
      Phase::Hint => "hint",
    })
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
  /// Local check failed; nothing was sent to the provider.
  #[error("{0}")]
  Validation(String),
  #[error("a {0} request is already in flight")]
  Busy(Phase),
  #[error("failed to generate a challenge: {0}")]
  Generation(ProviderError),
  #[error("failed to grade the submission: {0}")]
  Grading(ProviderError),
  #[error("failed to generate a solution: {0}")]
  Solution(ProviderError),
  #[error("failed to generate a hint: {0}")]
  Hint(ProviderError),
}
