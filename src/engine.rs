//! The execution loop.
//!
//! Drives one browser page through a queue of steps that can grow while it is
//! being consumed. After every interactive step the loop looks for a new UI
//! layer or a completed submit, takes out-of-band screenshots for those, and
//! asks the planner for follow-up steps that are spliced in right after the
//! current one. A failing step becomes an `error:` record; the run goes on.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use std::thread::sleep;
use tracing::{debug, error, info, warn};

use crate::auth::{Authenticator, Credentials, PromptField};
use crate::brain::Planner;
use crate::capture::{self, ArtifactWriter, CaptureContext};
use crate::change;
use crate::config::EngineConfig;
use crate::dom;
use crate::error::{EngineError, Result};
use crate::hands::{BrowserDriver, Locator};
use crate::planner;
use crate::resolve;
use crate::types::{
    Action, ExecutionRecord, MAX_DYNAMIC_STEPS, RunSummary, SKIPPED_SCREENSHOT, Step, StepQueue,
    StepStatus,
};

const FORM_SELECTOR: &str = "form";
const MODAL_SELECTOR: &str = "dialog, [role='dialog'], .modal";
const LAYER_PROBE: &str = "dialog, [role='dialog'], [role='menu'], .modal, form";
const SCROLL_STEP_PX: i64 = 500;

const OVERLAY_BUTTONS: &[&str] = &[
    "button:has-text('Accept')",
    "button:has-text('Agree')",
    "button:has-text('I Agree')",
    "button:has-text('Allow all')",
    "button:has-text('Got it')",
    "button:has-text('Okay')",
    "button:has-text('OK')",
    "[role='dialog'] button:has-text('Accept')",
];

const CAPTCHA_SIGNALS: &[&str] = &[
    "captcha",
    "hcaptcha",
    "recaptcha",
    "i'm not a robot",
    "type the text you hear or see",
    "verify you are human",
];

/// Clicks that close a form or modal when they succeed.
const SUBMIT_WORDS: &[&str] = &["submit", "create", "save", "done", "continue", "next"];
/// Clicks whose results tend to render late; a following wait is stretched.
const SLOW_RESULT_WORDS: &[&str] = &["submit", "create", "save", "download", "continue", "confirm"];

static SUBMIT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)type=['"]submit['"]"#).expect("valid submit regex"));
static SEARCHISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)search|find|filter").expect("valid search regex"));

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(n))
}

fn is_submit_like(selector: &str) -> bool {
    contains_any(selector, SUBMIT_WORDS) || SUBMIT_TYPE.is_match(selector)
}

/// Value for a fill step whose plan left it blank, guessed from the selector.
fn placeholder_value(selector: &str) -> String {
    let s = selector.to_lowercase();
    if s.contains("firstname") || s.contains("first") {
        "Test".to_string()
    } else if s.contains("lastname") || s.contains("last") {
        "User".to_string()
    } else if s.contains("username") || s.contains("user") {
        format!("user{}", Utc::now().timestamp())
    } else if s.contains("name") {
        "Sample Name".to_string()
    } else if s.contains("title") {
        "Sample Title".to_string()
    } else if s.contains("description") || s.contains("desc") {
        "Sample description".to_string()
    } else {
        "Sample".to_string()
    }
}

/// Mutable state of one run. Dropped when the run ends.
struct RunState {
    queue: StepQueue,
    records: Vec<ExecutionRecord>,
    previous_dom: String,
    last_url: Option<String>,
    credentials: Option<Credentials>,
    layers: usize,
    successes: usize,
    notes: Vec<String>,
}

/// Result of the login pre-pass. The credentials are kept either way so later
/// fill steps on email and password fields can reuse them.
struct LoginOutcome {
    credentials: Credentials,
    logged_in: bool,
}

/// What a dispatched step observed.
#[derive(Debug, Default, Clone, Copy)]
struct StepOutcome {
    ui_change: bool,
    extra_captured: bool,
}

pub struct Engine<'a> {
    driver: &'a mut dyn BrowserDriver,
    planner: &'a dyn Planner,
    auth: Option<&'a dyn Authenticator>,
    config: EngineConfig,
    artifacts: ArtifactWriter,
    task: String,
}

impl<'a> Engine<'a> {
    pub fn new(
        driver: &'a mut dyn BrowserDriver,
        planner: &'a dyn Planner,
        config: EngineConfig,
        artifacts: ArtifactWriter,
        task: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            planner,
            auth: None,
            config,
            artifacts,
            task: task.into(),
        }
    }

    pub fn with_authenticator(mut self, auth: &'a dyn Authenticator) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Run the task to completion. Only [`EngineError::NoPlan`] aborts; the
    /// summary and report are written in every case.
    pub fn run(&mut self, start_url: Option<&str>) -> Result<RunSummary> {
        if let Some(url) = start_url {
            info!("Navigating to {}", url);
            if let Err(e) = self.driver.navigate(url, self.config.timings.navigation) {
                warn!("⚠ {}; continuing with partial load", e);
            }
        }
        self.dismiss_overlays();

        let initial_ok = self.shoot(&capture::shot_name(0, "initial"));
        debug!(initial_ok, "Initial state captured");

        let mut state = RunState {
            queue: StepQueue::default(),
            records: Vec::new(),
            previous_dom: String::new(),
            last_url: None,
            credentials: None,
            layers: 0,
            successes: 0,
            notes: Vec::new(),
        };

        let mut html = self.safe_content();
        let mut url = self.driver.current_url();
        info!(url = %url, "Analyzing page state");

        if contains_any(&html, CAPTCHA_SIGNALS) {
            warn!("⚠ CAPTCHA or anti-bot challenge detected; halting");
            self.shoot(&capture::shot_name(1, "captcha_detected"));
            state
                .notes
                .push("CAPTCHA detected - workflow halted to avoid unnecessary interactions.".into());
            return Ok(self.finish(&state, false));
        }

        let mut steps = self.initial_plan(&url, &html, false);
        self.save_plan(&steps);

        if let Some(login) = self.authenticate(&url) {
            state.credentials = Some(login.credentials);
            if login.logged_in {
                html = self.safe_content();
                url = self.driver.current_url();
                info!("Regenerating plan for authenticated session...");
                steps = self.initial_plan(&url, &html, true);
                self.save_plan(&steps);
            } else {
                info!("Keeping the unauthenticated plan");
            }
        }

        if steps.is_empty() {
            error!("✗ No automation steps generated");
            let final_ok = self.shoot(&capture::shot_name(1, "final"));
            self.finish(&state, final_ok);
            return Err(EngineError::NoPlan);
        }
        info!("✓ Generated {} automation steps", steps.len());

        state.queue = StepQueue::new(steps);
        state.previous_dom = html;
        state.last_url = Some(url);

        while let Some(step) = state.queue.current().cloned() {
            self.run_step(&mut state, &step);
            state.queue.advance();
        }

        let final_name = capture::shot_name(state.queue.len() + 1, "final");
        let final_ok = self.shoot(&final_name);
        if final_ok {
            info!("✓ Final state captured: {}", final_name);
        } else {
            warn!("⚠ Final screenshot failed: {}", final_name);
        }
        Ok(self.finish(&state, final_ok))
    }

    fn finish(&self, state: &RunState, final_capture: bool) -> RunSummary {
        let summary = RunSummary {
            task: self.task.clone(),
            total_steps: state.records.len(),
            captures: state.records.iter().filter(|r| r.captured()).count(),
            layers: state.layers,
            success_states: state.successes,
            final_capture,
            provider: self.config.planner_provider.clone(),
            model: self.config.planner_model.clone(),
        };
        self.artifacts
            .finish(&self.task, &state.records, &state.notes, &summary);
        summary
    }

    /// LLM plan first, heuristic seed when it has nothing.
    fn initial_plan(&self, url: &str, html: &str, authenticated: bool) -> Vec<Step> {
        let html = (!html.is_empty()).then_some(html);
        let steps = self.planner.plan(&self.task, Some(url), html, None);
        if !steps.is_empty() {
            return steps;
        }
        debug!("Planner returned nothing; using heuristic plan");
        planner::generate_steps(&self.task, Some(url), html, authenticated)
    }

    fn save_plan(&self, steps: &[Step]) {
        match self.artifacts.write_plan(steps) {
            Ok(()) => debug!("Saved plan ({} steps)", steps.len()),
            Err(e) => warn!("⚠ Could not save plan: {}", e),
        }
    }

    /// Log in before planning when the task needs an account. `None` when no
    /// login was attempted.
    fn authenticate(&mut self, url: &str) -> Option<LoginOutcome> {
        if self.config.skip_auth {
            info!("Authentication skipped by configuration");
            return None;
        }
        let auth = self.auth?;
        if !auth.requires_authentication(&self.task, url) {
            if crate::auth::is_login_like(self.driver) {
                info!("Login page detected but task does not need authentication");
            }
            return None;
        }

        info!("⚠ Task requires authentication; attempting login");
        let Some(creds) = auth.credentials(url, &self.task) else {
            warn!("No credentials available; continuing without authentication");
            return None;
        };

        let timings = self.config.timings.clone();
        let mut logged_in = auth.attempt_login(self.driver, &creds, &timings);
        if !logged_in {
            for login_url in auth.login_urls(url) {
                info!("Trying login URL: {}", login_url);
                if let Err(e) = self.driver.navigate(&login_url, timings.restore_navigation) {
                    debug!("{}", e);
                    continue;
                }
                if auth.attempt_login(self.driver, &creds, &timings) {
                    logged_in = true;
                    break;
                }
            }
        }

        if !logged_in {
            warn!(
                "✗ {}; proceeding with limited access",
                EngineError::AuthenticationFailed("could not log in".into())
            );
            return Some(LoginOutcome { credentials: creds, logged_in: false });
        }

        sleep(timings.login_settle);
        self.shoot(&capture::shot_name(0, "auth_success"));
        info!("✓ Logged in successfully");
        Some(LoginOutcome { credentials: creds, logged_in: true })
    }

    fn dismiss_overlays(&mut self) {
        for css in OVERLAY_BUTTONS {
            let locator = Locator::Css(css.to_string());
            if self.driver.is_visible(&locator) {
                match self.driver.click(&locator, false) {
                    Ok(()) => {
                        debug!("Dismissed overlay via {}", css);
                        sleep(self.config.timings.wait_settle);
                    }
                    Err(e) => debug!("overlay click failed: {}", e),
                }
            }
        }
    }

    /// Screenshot into the output directory. Never fails the run.
    fn shoot(&mut self, name: &str) -> bool {
        let bytes = match self.driver.screenshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("⚠ Screenshot {} failed: {}", name, e);
                return false;
            }
        };
        match self.artifacts.save_png(name, &bytes) {
            Ok(_) => true,
            Err(e) => {
                warn!("⚠ Could not write {}: {}", name, e);
                false
            }
        }
    }

    fn safe_content(&mut self) -> String {
        if self.driver.is_closed() {
            return String::new();
        }
        self.driver.content().unwrap_or_else(|e| {
            warn!("Page content unavailable: {}", e);
            String::new()
        })
    }

    /// Recreate a closed page and try to get back to where it was.
    fn ensure_page(&mut self, state: &RunState) {
        if !self.driver.is_closed() {
            return;
        }
        if let Err(e) = self.driver.reopen() {
            error!("✗ Failed to recreate page: {}", e);
            return;
        }
        if let Some(url) = &state.last_url {
            match self.driver.navigate(url, self.config.timings.restore_navigation) {
                Ok(()) => info!("✓ Restored last URL: {}", url),
                Err(e) => warn!("Could not restore last URL ({})", e),
            }
        }
    }

    fn run_step(&mut self, state: &mut RunState, step: &Step) {
        let number = state.queue.cursor() + 1;
        let selector = step.selector_str().to_string();
        info!(step = number, action = %step.action, selector = %selector, "{}", step.description);

        self.ensure_page(state);
        let url_before = self.driver.current_url();

        let outcome = match self.dispatch(state, step, number, &url_before) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_error(state, step, number, e);
                return;
            }
        };

        let url_after = self.driver.current_url();
        let url_changed = change::url_changed(&url_before, &url_after);
        state.last_url = Some(url_after.clone());

        let ctx = CaptureContext {
            action: step.action,
            ui_change: outcome.ui_change,
            url_changed,
            selector: &selector,
            near_end: state.queue.is_near_end(),
            extra_captured: outcome.extra_captured,
        };

        let (status, screenshot) = if capture::should_capture(self.config.capture_mode, &ctx) {
            let name = capture::shot_name(number, step.action.as_str());
            if self.shoot(&name) {
                (StepStatus::Ok, name)
            } else {
                (StepStatus::ScreenshotFailed, name)
            }
        } else {
            debug!(step = number, "No significant change; screenshot skipped");
            (StepStatus::Skipped, SKIPPED_SCREENSHOT.to_string())
        };

        state.records.push(ExecutionRecord {
            step: number,
            description: step.description.clone(),
            action: step.action,
            selector,
            status,
            screenshot,
            url: Some(url_after),
        });
    }

    fn record_error(&mut self, state: &mut RunState, step: &Step, number: usize, err: EngineError) {
        error!(step = number, "✗ Error: {}", err);
        let name = capture::shot_name(number, "error");
        let shot_ok = self.shoot(&name);
        let url = (!self.driver.is_closed()).then(|| self.driver.current_url());
        state.records.push(ExecutionRecord {
            step: number,
            description: step.description.clone(),
            action: step.action,
            selector: step.selector_str().to_string(),
            status: StepStatus::Error {
                detail: err.to_string(),
                screenshot_failed: !shot_ok,
            },
            screenshot: name,
            url,
        });
    }

    fn dispatch(
        &mut self,
        state: &mut RunState,
        step: &Step,
        number: usize,
        url_before: &str,
    ) -> Result<StepOutcome> {
        let timings = &self.config.timings;
        match step.action {
            Action::Navigate => {
                let url = step.url.as_deref().unwrap_or_default();
                if let Err(e) = self.driver.navigate(url, timings.navigation) {
                    warn!("⚠ {}; continuing anyway", e);
                }
                sleep(timings.fill_settle);
                Ok(StepOutcome { ui_change: true, extra_captured: false })
            }
            Action::Click => self.click(state, step, number, url_before),
            Action::Fill => {
                let selector = step.selector_str();
                let value = match step.value.as_deref().filter(|v| !v.is_empty()) {
                    Some(v) => v.to_string(),
                    None => self.fill_value(state, selector),
                };
                resolve::robust_fill(self.driver, selector, &value)?;
                sleep(self.config.timings.fill_settle);
                Ok(StepOutcome::default())
            }
            Action::Press => {
                let key = step.key.as_deref().unwrap_or("Enter");
                self.driver.press(key)?;
                sleep(timings.press_settle);
                Ok(StepOutcome::default())
            }
            Action::Wait => {
                self.wait(state, step);
                Ok(StepOutcome::default())
            }
            Action::Scroll => {
                self.driver.scroll_by(SCROLL_STEP_PX)?;
                sleep(timings.scroll_settle);
                Ok(StepOutcome::default())
            }
            Action::Unknown => {
                warn!("Unknown action in step '{}'", step.description);
                sleep(timings.unknown_action);
                Ok(StepOutcome::default())
            }
        }
    }

    fn click(
        &mut self,
        state: &mut RunState,
        step: &Step,
        number: usize,
        url_before: &str,
    ) -> Result<StepOutcome> {
        let selector = step.selector_str();
        let timings = self.config.timings.clone();
        let mut outcome = StepOutcome::default();

        let pre_forms = self.driver.count(FORM_SELECTOR);
        let pre_modals = self.driver.count(MODAL_SELECTOR);

        let rung = resolve::robust_click(self.driver, selector)?;
        debug!(rung, "click succeeded");
        sleep(timings.click_settle);

        let url_now = self.driver.current_url();
        if change::url_changed(url_before, &url_now) {
            info!("✓ Navigation detected: {} → {}", url_before, url_now);
        }
        if self
            .driver
            .wait_visible(&Locator::Css(LAYER_PROBE.to_string()), timings.layer_probe)
        {
            debug!("Modal/form/menu visible after click");
            outcome.ui_change = true;
        }
        if SEARCHISH.is_match(selector) {
            self.driver
                .wait_visible(&Locator::Css(planner::GENERIC_SEARCH_INPUT.to_string()), timings.layer_probe);
        }
        sleep(timings.click_settle);

        let current_dom = self.safe_content();
        let current_url = self.driver.current_url();
        if change::state_changed(&state.previous_dom, &current_dom, url_before, &current_url) {
            outcome.ui_change = true;
        }
        if !state.previous_dom.is_empty()
            && !current_dom.is_empty()
            && change::dom_layer_emerged(&state.previous_dom, &current_dom, &current_url)
        {
            info!("✓ New UI layer detected");
            if self.shoot(&capture::shot_name(number, "layer")) {
                outcome.extra_captured = true;
                outcome.ui_change = true;
                state.layers += 1;
                self.replan(state, &current_url, &current_dom, "layer detection");
            }
        }
        if !current_dom.is_empty() {
            state.previous_dom = current_dom;
        }

        let post_forms = self.driver.count(FORM_SELECTOR);
        let post_modals = self.driver.count(MODAL_SELECTOR);
        let dismissed = post_forms < pre_forms || post_modals < pre_modals;
        if is_submit_like(selector) && dismissed && self.shoot(&capture::shot_name(number, "success")) {
            info!("✓ Success state captured (form/modal dismissed)");
            outcome.extra_captured = true;
            outcome.ui_change = true;
            state.successes += 1;
            let dom = self.safe_content();
            let url = self.driver.current_url();
            self.replan(state, &url, &dom, "success state");
        }

        Ok(outcome)
    }

    /// Ask the planner for follow-up steps and splice them in after the cursor.
    fn replan(&mut self, state: &mut RunState, url: &str, dom: &str, reason: &str) {
        let html = (!dom.is_empty()).then_some(dom);
        let mut extra: Vec<Step> = self
            .planner
            .plan(&self.task, Some(url), html, Some(state.records.as_slice()))
            .into_iter()
            .filter(Step::is_well_formed)
            .collect();
        extra.truncate(MAX_DYNAMIC_STEPS);
        if extra.is_empty() {
            return;
        }
        let added = state.queue.insert_after_cursor(extra);
        info!("Planner added {} dynamic step(s) after {}", added, reason);
        self.save_plan(state.queue.steps());
    }

    fn fill_value(&self, state: &RunState, selector: &str) -> String {
        let s = selector.to_lowercase();
        let secret = if s.contains("email") {
            Some(PromptField::Email)
        } else if s.contains("password") {
            Some(PromptField::Password)
        } else {
            None
        };
        let Some(field) = secret else {
            return placeholder_value(selector);
        };
        let known = state.credentials.as_ref().map(|c| match field {
            PromptField::Email => c.email.clone(),
            PromptField::Password => c.password.clone(),
        });
        known
            .or_else(|| self.auth.and_then(|a| a.prompt(field)))
            .unwrap_or_default()
    }

    fn wait(&mut self, state: &RunState, step: &Step) {
        let timings = self.config.timings.clone();
        let selector = step.selector_str();

        let mut tokens = dom::split_top(selector);
        if tokens.is_empty() {
            tokens.push("body");
        }

        let waited = tokens.into_iter().any(|token| {
            let locator = match token.strip_prefix("text=") {
                Some(text) => Locator::Text(text.to_string()),
                None => Locator::Css(token.to_string()),
            };
            self.driver.wait_visible(&locator, timings.wait_token)
        });
        if !waited {
            self.driver
                .wait_visible(&Locator::Css("body".to_string()), timings.body_fallback);
        }

        let mut delay = timings.wait_hint(&step.description);
        let after_submit = state.queue.previous().is_some_and(|prev| {
            prev.action == Action::Click && contains_any(prev.selector_str(), SLOW_RESULT_WORDS)
        });
        if after_submit {
            delay = delay.max(timings.post_submit_wait);
            debug!("Extended wait after submit action ({:?})", delay);
        }
        sleep(delay);
    }
}
