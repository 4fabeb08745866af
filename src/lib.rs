//! Adaptive browser task runner.
//!
//! Turns a natural-language task into browser steps, runs them against a live
//! page and captures a screenshot at every meaningful UI transition. New
//! steps are planned while the run is in progress whenever a modal, menu or
//! form appears.

pub mod auth;
pub mod brain;
pub mod capture;
pub mod change;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod hands;
pub mod intent;
pub mod planner;
pub mod resolve;
pub mod scorer;
pub mod types;

pub use brain::{Brain, Offline, Planner};
pub use capture::ArtifactWriter;
pub use config::{CaptureMode, EngineConfig, Timings};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use hands::{BrowserDriver, BrowserSession, LaunchSettings, Locator};
pub use types::{Action, ExecutionRecord, RunSummary, Step, StepStatus};
