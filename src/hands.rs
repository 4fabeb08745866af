use anyhow::anyhow;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::dom::{self, LocateMode};
use crate::error::{EngineError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_TAB_TIMEOUT: Duration = Duration::from_secs(20);
const DEBUG_PORT_URL: &str = "http://127.0.0.1:9222";

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Locator {
    /// CSS, including comma lists, `:has-text('...')` and `text=` parts.
    Css(String),
    Text(String),
    Role { role: String, name: String },
    Label(String),
    Placeholder(String),
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "{s}"),
            Locator::Text(s) => write!(f, "text={s}"),
            Locator::Role { role, name } => write!(f, "role={role}[name~={name}]"),
            Locator::Label(s) => write!(f, "label={s}"),
            Locator::Placeholder(s) => write!(f, "placeholder={s}"),
        }
    }
}

/// Browser primitives the execution loop drives.
///
/// Every call is blocking. Lookups never fail: an absent element is `false`
/// or `0`. Interactions return [`EngineError::SelectorNotFound`] when nothing
/// matches.
pub trait BrowserDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    fn click(&mut self, locator: &Locator, force: bool) -> Result<()>;
    fn fill(&mut self, locator: &Locator, value: &str) -> Result<()>;
    fn press(&mut self, key: &str) -> Result<()>;
    fn screenshot(&mut self) -> Result<Vec<u8>>;
    fn content(&mut self) -> Result<String>;
    fn current_url(&mut self) -> String;
    fn is_closed(&mut self) -> bool;
    /// Replace a closed page with a fresh one.
    fn reopen(&mut self) -> Result<()>;
    /// Visible matches for a CSS selector.
    fn count(&mut self, css: &str) -> usize;
    fn is_visible(&mut self, locator: &Locator) -> bool;
    fn scroll_by(&mut self, dy: i64) -> Result<()>;

    /// Poll until `locator` is visible or `timeout` elapses. Always checks once.
    fn wait_visible(&mut self, locator: &Locator, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(locator) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Launch settings for the Chrome session.
#[derive(Debug, Clone, Default)]
pub struct LaunchSettings {
    pub headless: bool,
    /// Persistent profile directory so logins survive between runs.
    pub profile_dir: Option<PathBuf>,
}

/// One Chrome instance and the tab the engine drives.
pub struct BrowserSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(settings: &LaunchSettings) -> anyhow::Result<Self> {
        // Headed runs may reuse a Chrome the user started with --remote-debugging-port.
        if !settings.headless {
            info!("🔗 Attempting to attach to existing Chrome on port 9222...");
            if let Ok(browser) = Browser::connect(DEBUG_PORT_URL.to_string()) {
                info!("✅ Attached to existing Chrome");
                let existing = {
                    let tabs = browser.get_tabs();
                    let tabs = tabs.lock().map_err(|_| anyhow!("tab list lock poisoned"))?;
                    tabs.first().cloned()
                };
                let tab = match existing {
                    Some(tab) => tab,
                    None => browser.new_tab()?,
                };
                return Ok(Self { browser, tab });
            }
            debug!("No Chrome listening on {}; launching a new one", DEBUG_PORT_URL);
        }

        if let Some(dir) = &settings.profile_dir {
            std::fs::create_dir_all(dir)?;
        }

        let options = LaunchOptions {
            headless: settings.headless,
            path: find_chrome(),
            user_data_dir: settings.profile_dir.clone(),
            window_size: Some((1366, 900)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        info!(headless = settings.headless, "Starting Chrome...");
        let browser = Browser::new(options).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(DEFAULT_TAB_TIMEOUT);
        info!("Chrome ready");

        Ok(Self { browser, tab })
    }

    fn eval(&self, script: &str) -> Result<Option<serde_json::Value>> {
        let result = self.tab.evaluate(script, false).map_err(EngineError::browser)?;
        Ok(result.value)
    }

    /// Tag the element `locator` resolves to and return its marker selector.
    fn mark(&self, locator: &Locator, force: bool) -> Result<String> {
        let mode = if force { LocateMode::Force } else { LocateMode::Mark };
        let marker = self
            .eval(&dom::locate_script(locator, mode))?
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        if marker.is_empty() {
            return Err(EngineError::SelectorNotFound(locator.to_string()));
        }
        Ok(marker)
    }
}

impl BrowserDriver for BrowserSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        let outcome = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated().map(|_| ()));
        self.tab.set_default_timeout(DEFAULT_TAB_TIMEOUT);
        outcome.map_err(|e| {
            debug!("navigate({}) failed: {}", url, e);
            EngineError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        })
    }

    fn click(&mut self, locator: &Locator, force: bool) -> Result<()> {
        let marker = self.mark(locator, force)?;
        if force {
            let clicked = self
                .eval(&dom::force_click_script(&marker))?
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if !clicked {
                return Err(EngineError::SelectorNotFound(locator.to_string()));
            }
            return Ok(());
        }
        let element = self.tab.find_element(&marker).map_err(EngineError::browser)?;
        element.click().map_err(EngineError::browser)?;
        Ok(())
    }

    fn fill(&mut self, locator: &Locator, value: &str) -> Result<()> {
        let marker = self.mark(locator, false)?;
        let element = self.tab.find_element(&marker).map_err(EngineError::browser)?;
        element.click().map_err(EngineError::browser)?;
        self.eval(&dom::clear_value_script(&marker))?;
        self.tab.type_str(value).map_err(EngineError::browser)?;
        Ok(())
    }

    fn press(&mut self, key: &str) -> Result<()> {
        self.tab.press_key(key).map_err(EngineError::browser)?;
        Ok(())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| {
                if self.tab.evaluate("1", false).is_err() {
                    EngineError::PageClosed
                } else {
                    EngineError::browser(e)
                }
            })
    }

    fn content(&mut self) -> Result<String> {
        self.tab.get_content().map_err(EngineError::browser)
    }

    fn current_url(&mut self) -> String {
        self.tab.get_url()
    }

    fn is_closed(&mut self) -> bool {
        self.tab.evaluate("1", false).is_err()
    }

    fn reopen(&mut self) -> Result<()> {
        warn!("⚠ Page appears closed; creating a new tab");
        self.tab = self.browser.new_tab().map_err(EngineError::browser)?;
        self.tab.set_default_timeout(DEFAULT_TAB_TIMEOUT);
        Ok(())
    }

    fn count(&mut self, css: &str) -> usize {
        self.eval(&dom::locate_script(&Locator::Css(css.to_string()), LocateMode::Count))
            .ok()
            .flatten()
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize
    }

    fn is_visible(&mut self, locator: &Locator) -> bool {
        self.eval(&dom::locate_script(locator, LocateMode::Visible))
            .ok()
            .flatten()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn scroll_by(&mut self, dy: i64) -> Result<()> {
        self.eval(&dom::scroll_script(dy))?;
        Ok(())
    }
}

/// Locate a Chrome/Chromium binary. `None` lets headless_chrome search on its own.
fn find_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let mut candidates: Vec<PathBuf> = vec![
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/usr/bin/google-chrome"),
        PathBuf::from("/usr/bin/chromium"),
        PathBuf::from("/usr/bin/chromium-browser"),
    ];
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join("Google").join("Chrome").join("Application").join("chrome.exe"));
    }

    candidates.into_iter().find(|p| p.exists())
}
