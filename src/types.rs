use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Kind of browser interaction a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Navigate,
    Click,
    Fill,
    Wait,
    Scroll,
    Press,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Navigate => "navigate",
            Action::Click => "click",
            Action::Fill => "fill",
            Action::Wait => "wait",
            Action::Scroll => "scroll",
            Action::Press => "press",
            Action::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single automation instruction. Planners produce these; the engine never
/// edits one after it is queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub description: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Step {
    fn bare(description: impl Into<String>, action: Action) -> Self {
        Self {
            description: description.into(),
            action,
            selector: None,
            url: None,
            value: None,
            key: None,
        }
    }

    pub fn navigate(description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::bare(description, Action::Navigate)
        }
    }

    pub fn click(description: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(description, Action::Click)
        }
    }

    pub fn fill(
        description: impl Into<String>,
        selector: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            selector: Some(selector.into()),
            value: Some(value.into()),
            ..Self::bare(description, Action::Fill)
        }
    }

    pub fn wait(description: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(description, Action::Wait)
        }
    }

    pub fn scroll(description: impl Into<String>) -> Self {
        Self::bare(description, Action::Scroll)
    }

    pub fn press(description: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::bare(description, Action::Press)
        }
    }

    /// Selector text, or an empty string when the step has none.
    pub fn selector_str(&self) -> &str {
        self.selector.as_deref().unwrap_or("")
    }

    /// Whether the step carries the fields its action requires.
    pub fn is_well_formed(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match self.action {
            Action::Navigate => present(&self.url),
            Action::Click | Action::Fill => present(&self.selector),
            Action::Press => present(&self.key),
            Action::Wait | Action::Scroll => true,
            Action::Unknown => false,
        }
    }
}

/// Ordered steps plus a read cursor.
///
/// The cursor only moves forward and insertions land strictly after it, so the
/// engine can extend its own future while never rewriting what already ran.
#[derive(Debug, Clone, Default)]
pub struct StepQueue {
    steps: Vec<Step>,
    idx: usize,
}

impl StepQueue {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps, idx: 0 }
    }

    pub fn current(&self) -> Option<&Step> {
        self.steps.get(self.idx)
    }

    /// The step consumed just before the current one.
    pub fn previous(&self) -> Option<&Step> {
        self.idx.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn cursor(&self) -> usize {
        self.idx
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.idx >= self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.idx += 1;
        }
    }

    /// Splice `new_steps` immediately after the cursor. Returns how many were inserted.
    pub fn insert_after_cursor(&mut self, new_steps: Vec<Step>) -> usize {
        let count = new_steps.len();
        let at = (self.idx + 1).min(self.steps.len());
        self.steps.splice(at..at, new_steps);
        count
    }

    /// True when the cursor sits on one of the last two queued steps.
    pub fn is_near_end(&self) -> bool {
        self.idx + 2 >= self.steps.len()
    }
}

/// Outcome of one consumed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    Skipped,
    ScreenshotFailed,
    Error { detail: String, screenshot_failed: bool },
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Ok => f.write_str("ok"),
            StepStatus::Skipped => f.write_str("ok (screenshot skipped: no significant change)"),
            StepStatus::ScreenshotFailed => f.write_str("warning: screenshot_failed"),
            StepStatus::Error {
                detail,
                screenshot_failed,
            } => {
                write!(f, "error: {detail}")?;
                if *screenshot_failed {
                    f.write_str("; screenshot_failed")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for StepStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of the audit trail, appended for every consumed step.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub step: usize,
    pub description: String,
    pub action: Action,
    pub selector: String,
    pub status: StepStatus,
    /// Screenshot file name, or `"skipped"`.
    pub screenshot: String,
    pub url: Option<String>,
}

impl ExecutionRecord {
    pub fn captured(&self) -> bool {
        self.screenshot != SKIPPED_SCREENSHOT
    }
}

pub const SKIPPED_SCREENSHOT: &str = "skipped";

/// Final numbers written to `run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub task: String,
    pub total_steps: usize,
    pub captures: usize,
    pub layers: usize,
    pub success_states: usize,
    pub final_capture: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// A clickable element that survived relevance scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub score: i32,
    pub tag: String,
    pub aria_label: String,
}

/// A form field the planner may fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCandidate {
    pub selector: String,
    pub hint: String,
    pub input_type: String,
}

pub const MAX_PLAN_STEPS: usize = 20;
pub const MAX_DYNAMIC_STEPS: usize = 5;
pub const HISTORY_WINDOW: usize = 12;
pub const DOM_SLICE_MAX_CHARS: usize = 4000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_constraints() {
        assert!(Step::navigate("go", "https://example.com").is_well_formed());
        assert!(!Step::navigate("go", "").is_well_formed());
        assert!(Step::click("c", "button").is_well_formed());
        assert!(!Step::bare("c", Action::Click).is_well_formed());
        assert!(!Step::bare("f", Action::Fill).is_well_formed());
        assert!(Step::press("p", "Enter").is_well_formed());
        assert!(!Step::bare("p", Action::Press).is_well_formed());
        assert!(Step::scroll("s").is_well_formed());
        assert!(!Step::bare("?", Action::Unknown).is_well_formed());
    }

    #[test]
    fn test_step_json_shape() {
        let json = serde_json::to_value(Step::fill("Type", "input[name='q']", "rust")).unwrap();
        assert_eq!(json["action"], "fill");
        assert_eq!(json["value"], "rust");
        assert!(json.get("url").is_none());

        let parsed: Step =
            serde_json::from_str(r#"{"description":"hover","action":"hover"}"#).unwrap();
        assert_eq!(parsed.action, Action::Unknown);
    }

    #[test]
    fn test_queue_cursor_never_moves_back_and_inserts_after_cursor() {
        let mut queue = StepQueue::new(vec![Step::scroll("a"), Step::scroll("b"), Step::scroll("c")]);
        let mut last_cursor = queue.cursor();

        for round in 0..6 {
            let before: Vec<Step> = queue.steps()[..=queue.cursor().min(queue.len() - 1)].to_vec();
            if round % 2 == 0 {
                let inserted =
                    queue.insert_after_cursor(vec![Step::scroll(format!("dyn{round}"))]);
                assert_eq!(inserted, 1);
                assert_eq!(queue.steps()[queue.cursor() + 1].description, format!("dyn{round}"));
            }
            // history up to and including the cursor is untouched
            assert_eq!(&queue.steps()[..before.len()], before.as_slice());
            queue.advance();
            assert!(queue.cursor() >= last_cursor);
            last_cursor = queue.cursor();
        }
    }

    #[test]
    fn test_queue_advance_stops_at_end() {
        let mut queue = StepQueue::new(vec![Step::scroll("only")]);
        assert!(queue.is_near_end());
        queue.advance();
        queue.advance();
        assert!(queue.is_exhausted());
        assert_eq!(queue.cursor(), 1);
        assert_eq!(queue.previous().map(|s| s.description.as_str()), Some("only"));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(StepStatus::Ok.to_string(), "ok");
        assert_eq!(
            StepStatus::Error {
                detail: "boom".into(),
                screenshot_failed: true
            }
            .to_string(),
            "error: boom; screenshot_failed"
        );
        let json = serde_json::to_string(&StepStatus::Skipped).unwrap();
        assert!(json.contains("screenshot skipped"));
    }
}
