use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

static SECONDS_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:second|sec)").expect("valid seconds regex"));

fn seconds_hint(description: &str) -> Option<u64> {
    SECONDS_HINT
        .captures(&description.to_lowercase())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Screenshot strategy for ordinary steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Capture only when the capture policy sees something worth keeping.
    #[default]
    Smart,
    /// Capture after every step.
    All,
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "smart" => Ok(Self::Smart),
            "all" => Ok(Self::All),
            other => Err(format!("unknown capture mode '{other}' (expected 'smart' or 'all')")),
        }
    }
}

/// Every settle delay and bounded wait the execution loop uses.
#[derive(Debug, Clone)]
pub struct Timings {
    pub navigation: Duration,
    pub restore_navigation: Duration,
    pub click_settle: Duration,
    pub layer_probe: Duration,
    pub fill_settle: Duration,
    pub press_settle: Duration,
    pub wait_token: Duration,
    pub body_fallback: Duration,
    pub wait_settle: Duration,
    pub post_submit_wait: Duration,
    pub scroll_settle: Duration,
    pub unknown_action: Duration,
    pub login_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            restore_navigation: Duration::from_secs(15),
            click_settle: Duration::from_millis(1500),
            layer_probe: Duration::from_secs(2),
            fill_settle: Duration::from_secs(1),
            press_settle: Duration::from_millis(500),
            wait_token: Duration::from_secs(8),
            body_fallback: Duration::from_secs(5),
            wait_settle: Duration::from_millis(500),
            post_submit_wait: Duration::from_secs(3),
            scroll_settle: Duration::from_secs(1),
            unknown_action: Duration::from_millis(500),
            login_settle: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// No sleeps and zero-length waits. Used when driving an in-memory browser.
    pub fn instant() -> Self {
        Self {
            navigation: Duration::ZERO,
            restore_navigation: Duration::ZERO,
            click_settle: Duration::ZERO,
            layer_probe: Duration::ZERO,
            fill_settle: Duration::ZERO,
            press_settle: Duration::ZERO,
            wait_token: Duration::ZERO,
            body_fallback: Duration::ZERO,
            wait_settle: Duration::ZERO,
            post_submit_wait: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            unknown_action: Duration::ZERO,
            login_settle: Duration::ZERO,
        }
    }

    /// Description-derived settle for wait steps ("wait 3 seconds").
    /// Never shorter than the configured base settle.
    pub fn wait_hint(&self, description: &str) -> Duration {
        let hinted = seconds_hint(description)
            .map(|secs| Duration::from_secs(secs).max(Duration::from_millis(500)));
        match hinted {
            Some(d) if !self.wait_settle.is_zero() => d,
            _ => self.wait_settle,
        }
    }
}

/// Engine configuration, built once and handed to the engine at construction.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub capture_mode: CaptureMode,
    pub planner_provider: Option<String>,
    pub planner_model: Option<String>,
    pub skip_auth: bool,
    pub timings: Timings,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let capture_mode = lookup("CAPTURE_MODE")
            .and_then(|raw| match raw.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    tracing::warn!("{}; falling back to smart capture", e);
                    None
                }
            })
            .unwrap_or_default();

        let planner_model = lookup("PLANNER_MODEL")
            .or_else(|| lookup("OPENAI_MODEL"))
            .filter(|m| !m.trim().is_empty());

        Self {
            capture_mode,
            planner_provider: lookup("PLANNER_PROVIDER").filter(|p| !p.trim().is_empty()),
            planner_model,
            skip_auth: false,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }
}
