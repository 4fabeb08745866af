//! Capture policy and on-disk artifacts for a run.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::CaptureMode;
use crate::error::Result;
use crate::types::{Action, ExecutionRecord, RunSummary, Step};

/// Selector vocabulary for clicks that usually finish a flow.
const FINAL_ACTION_WORDS: &[&str] = &[
    "submit", "create", "save", "download", "continue", "confirm", "finish", "done",
];

pub fn is_final_action(selector: &str) -> bool {
    let selector = selector.to_lowercase();
    FINAL_ACTION_WORDS.iter().any(|w| selector.contains(w))
}

/// Inputs to the per-step capture decision.
#[derive(Debug, Clone, Copy)]
pub struct CaptureContext<'a> {
    pub action: Action,
    pub ui_change: bool,
    pub url_changed: bool,
    pub selector: &'a str,
    /// The cursor sits on one of the last two queued steps.
    pub near_end: bool,
    /// A layer or success screenshot was already taken for this step.
    pub extra_captured: bool,
}

pub fn should_capture(mode: CaptureMode, ctx: &CaptureContext) -> bool {
    if ctx.extra_captured {
        return false;
    }
    if mode == CaptureMode::All {
        return true;
    }
    match ctx.action {
        Action::Fill | Action::Press | Action::Navigate => true,
        _ => ctx.ui_change || ctx.url_changed || is_final_action(ctx.selector) || ctx.near_end,
    }
}

/// File name for a screenshot taken at `step`.
pub fn shot_name(step: usize, suffix: &str) -> String {
    format!("step_{step:02}_{suffix}.png")
}

fn render_report(task: &str, records: &[ExecutionRecord], notes: &[String]) -> String {
    let mut out = format!("# Step-by-step execution log\n\nTask: {task}\n\n");
    for rec in records {
        out.push_str(&format!("- Step {}: {}\n", rec.step, rec.description));
        out.push_str(&format!("  - Action: {}\n", rec.action));
        if !rec.selector.is_empty() {
            out.push_str(&format!("  - Selector: `{}`\n", rec.selector));
        }
        out.push_str(&format!("  - Status: {}\n", rec.status));
        out.push_str(&format!("  - Screenshot: {}\n\n", rec.screenshot));
    }
    for note in notes {
        out.push_str(&format!("> {note}\n\n"));
    }
    out
}

/// Writes screenshots and reports into one output directory.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_png(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        info!("📸 Saved {}", path.display());
        Ok(path)
    }

    /// Overwrites `steps_plan.json` with the currently effective plan.
    pub fn write_plan(&self, steps: &[Step]) -> Result<()> {
        let json = serde_json::to_string_pretty(steps)?;
        fs::write(self.dir.join("steps_plan.json"), json)?;
        Ok(())
    }

    pub fn write_records(&self, records: &[ExecutionRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(self.dir.join("execution_log.json"), json)?;
        Ok(())
    }

    /// Markdown log of every consumed step, plus optional trailing notes.
    pub fn write_report(&self, task: &str, records: &[ExecutionRecord], notes: &[String]) -> Result<()> {
        fs::write(self.dir.join("steps_log.md"), render_report(task, records, notes))?;
        Ok(())
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.dir.join("run_summary.json");
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }

    /// Best-effort: report writing never fails a run.
    pub fn finish(&self, task: &str, records: &[ExecutionRecord], notes: &[String], summary: &RunSummary) {
        if let Err(e) = self.write_report(task, records, notes) {
            warn!("Could not write report: {}", e);
        }
        if let Err(e) = self.write_records(records) {
            warn!("Could not write execution log: {}", e);
        }
        match self.write_summary(summary) {
            Ok(path) => info!("✓ Wrote run summary: {}", path.display()),
            Err(e) => warn!("Could not write run summary: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepStatus;

    fn ctx(action: Action) -> CaptureContext<'static> {
        CaptureContext {
            action,
            ui_change: false,
            url_changed: false,
            selector: "div.card",
            near_end: false,
            extra_captured: false,
        }
    }

    #[test]
    fn test_input_actions_always_capture() {
        for action in [Action::Fill, Action::Press, Action::Navigate] {
            for ui_change in [false, true] {
                for url_changed in [false, true] {
                    let c = CaptureContext { ui_change, url_changed, ..ctx(action) };
                    assert!(should_capture(CaptureMode::Smart, &c), "{action}");
                }
            }
        }
    }

    #[test]
    fn test_click_needs_a_reason() {
        assert!(!should_capture(CaptureMode::Smart, &ctx(Action::Click)));
        assert!(!should_capture(CaptureMode::Smart, &ctx(Action::Scroll)));
        assert!(should_capture(
            CaptureMode::Smart,
            &CaptureContext { ui_change: true, ..ctx(Action::Click) }
        ));
        assert!(should_capture(
            CaptureMode::Smart,
            &CaptureContext { url_changed: true, ..ctx(Action::Wait) }
        ));
        assert!(should_capture(
            CaptureMode::Smart,
            &CaptureContext { selector: "button:has-text('Save')", ..ctx(Action::Click) }
        ));
        assert!(should_capture(
            CaptureMode::Smart,
            &CaptureContext { near_end: true, ..ctx(Action::Scroll) }
        ));
    }

    #[test]
    fn test_extra_capture_suppresses_duplicate() {
        let c = CaptureContext { ui_change: true, extra_captured: true, ..ctx(Action::Click) };
        assert!(!should_capture(CaptureMode::Smart, &c));
        assert!(!should_capture(CaptureMode::All, &c));
        assert!(should_capture(CaptureMode::All, &ctx(Action::Scroll)));
    }

    #[test]
    fn test_shot_name() {
        assert_eq!(shot_name(0, "initial"), "step_00_initial.png");
        assert_eq!(shot_name(7, "click"), "step_07_click.png");
        assert_eq!(shot_name(12, "final"), "step_12_final.png");
    }

    #[test]
    fn test_writer_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("run")).unwrap();
        writer.write_plan(&[Step::scroll("look around")]).unwrap();

        let record = ExecutionRecord {
            step: 1,
            description: "Click Create".into(),
            action: Action::Click,
            selector: "button".into(),
            status: StepStatus::Skipped,
            screenshot: "skipped".into(),
            url: None,
        };
        let summary = RunSummary {
            task: "t".into(),
            total_steps: 1,
            captures: 0,
            layers: 0,
            success_states: 0,
            final_capture: true,
            provider: None,
            model: None,
        };
        writer.finish("t", &[record], &["halted".to_string()], &summary);

        let plan = fs::read_to_string(writer.dir().join("steps_plan.json")).unwrap();
        assert!(plan.contains("\"scroll\""));
        let report = fs::read_to_string(writer.dir().join("steps_log.md")).unwrap();
        assert!(report.contains("- Step 1: Click Create"));
        assert!(report.contains("Status: ok (screenshot skipped: no significant change)"));
        assert!(report.contains("> halted"));
        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(writer.dir().join("run_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["final_capture"], true);
        assert!(writer.dir().join("execution_log.json").exists());
    }
}
