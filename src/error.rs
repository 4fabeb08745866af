//! Error taxonomy for a task run.
//!
//! Everything except [`EngineError::NoPlan`] is caught at the step boundary
//! and turned into an `error:` execution record; a run never aborts because a
//! single step failed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no element matched selector '{0}'")]
    SelectorNotFound(String),

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("page is closed")]
    PageClosed,

    #[error("planner unavailable: {0}")]
    PlannerUnavailable(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("no automation steps could be generated for this task")]
    NoPlan,

    #[error("browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn browser(err: impl std::fmt::Display) -> Self {
        Self::Browser(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
