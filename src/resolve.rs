//! Selector-resolution ladders.
//!
//! Planners hand over selectors in inconsistent shapes: real CSS, a bare
//! human label, a `:has-text()` form, a name hint. Each ladder is an ordered
//! list of resolvers; the first that yields a locator the driver can act on wins.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::hands::{BrowserDriver, Locator};

static HAS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"has-text\(\s*['"]\s*(.*?)\s*['"]\s*\)"#).expect("valid has-text regex")
});
static ID_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([a-zA-Z0-9_-]+)").expect("valid id regex"));
static NAME_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name=['\x22]?([a-zA-Z0-9_\[\]-]+)").expect("valid name regex"));
static PLACEHOLDER_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"placeholder\*?=['\x22]?([^'\x22\]]+)").expect("valid placeholder regex"));

const LABEL_BREAKERS: &[char] = &['[', ']', '#', '.', ':', '/', '(', ')'];
const MAX_LABEL_LEN: usize = 80;

/// Pull a human label out of a selector, if it carries one.
pub fn extract_label(selector: &str) -> Option<String> {
    if let Some(m) = HAS_TEXT.captures(selector).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }
    if let Some(rest) = selector.strip_prefix("text=") {
        return Some(rest.trim().to_string());
    }
    let plain = selector.trim();
    let looks_like_text = !plain.is_empty()
        && plain.chars().count() <= MAX_LABEL_LEN
        && !plain.contains(LABEL_BREAKERS);
    looks_like_text.then(|| plain.to_string())
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A click candidate plus whether to bypass hit-testing.
struct ClickTry {
    locator: Locator,
    force: bool,
}

type ClickResolver = fn(&mut dyn BrowserDriver, &str, Option<&str>) -> Vec<ClickTry>;

fn visible(driver: &mut dyn BrowserDriver, locator: Locator) -> Option<Locator> {
    driver.is_visible(&locator).then_some(locator)
}

fn exact(driver: &mut dyn BrowserDriver, selector: &str, _label: Option<&str>) -> Vec<ClickTry> {
    match visible(driver, Locator::Css(selector.to_string())) {
        Some(locator) => vec![
            ClickTry { locator: locator.clone(), force: false },
            ClickTry { locator, force: true },
        ],
        None => Vec::new(),
    }
}

fn submit_buttons(driver: &mut dyn BrowserDriver, _selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    let Some(label) = label else { return Vec::new() };
    if !["search", "submit", "go"].contains(&label.to_lowercase().as_str()) {
        return Vec::new();
    }
    [
        "button[type='submit'], input[type='submit']",
        "button:has-text('Search'), [aria-label*='search' i], [type='search']",
    ]
    .into_iter()
    .filter_map(|css| visible(driver, Locator::Css(css.to_string())))
    .map(|locator| ClickTry { locator, force: false })
    .collect()
}

fn aria_link(driver: &mut dyn BrowserDriver, _selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    label
        .and_then(|l| visible(driver, Locator::Css(format!("a[aria-label*='{}' i]", quote(l)))))
        .map(|locator| vec![ClickTry { locator, force: false }])
        .unwrap_or_default()
}

fn text(driver: &mut dyn BrowserDriver, _selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    label
        .and_then(|l| visible(driver, Locator::Text(l.to_string())))
        .map(|locator| vec![ClickTry { locator, force: false }])
        .unwrap_or_default()
}

fn role(driver: &mut dyn BrowserDriver, _selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    let Some(label) = label else { return Vec::new() };
    ["button", "link"]
        .into_iter()
        .filter_map(|role| {
            visible(
                driver,
                Locator::Role { role: role.to_string(), name: label.to_string() },
            )
        })
        .map(|locator| ClickTry { locator, force: false })
        .collect()
}

fn href(driver: &mut dyn BrowserDriver, _selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    let Some(label) = label.filter(|l| l.split_whitespace().count() <= 2) else {
        return Vec::new();
    };
    let fragment = label.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
    visible(driver, Locator::Css(format!("a[href*='{}']", quote(&fragment))))
        .map(|locator| vec![ClickTry { locator, force: false }])
        .unwrap_or_default()
}

fn forced(_driver: &mut dyn BrowserDriver, selector: &str, label: Option<&str>) -> Vec<ClickTry> {
    let mut tries = vec![ClickTry { locator: Locator::Css(selector.to_string()), force: true }];
    if let Some(label) = label {
        tries.push(ClickTry { locator: Locator::Text(label.to_string()), force: true });
    }
    tries
}

const CLICK_LADDER: &[(&str, ClickResolver)] = &[
    ("exact", exact),
    ("submit", submit_buttons),
    ("aria-label", aria_link),
    ("text", text),
    ("role", role),
    ("href", href),
    ("forced", forced),
];

/// Click `selector`, falling through progressively weaker lookups.
/// Returns the name of the rung that worked.
pub fn robust_click(driver: &mut dyn BrowserDriver, selector: &str) -> Result<&'static str> {
    let selector = selector.replace("🔹 ", "");
    let selector = selector.trim();
    let label = extract_label(selector);

    for (name, resolve) in CLICK_LADDER {
        for attempt in resolve(driver, selector, label.as_deref()) {
            match driver.click(&attempt.locator, attempt.force) {
                Ok(()) => {
                    debug!(rung = name, locator = %attempt.locator, force = attempt.force, "click resolved");
                    return Ok(*name);
                }
                Err(e) => debug!(rung = name, "click attempt failed: {}", e),
            }
        }
    }
    Err(EngineError::SelectorNotFound(selector.to_string()))
}

type FillResolver = fn(&mut dyn BrowserDriver, &str) -> Vec<Locator>;

fn fill_exact(driver: &mut dyn BrowserDriver, selector: &str) -> Vec<Locator> {
    visible(driver, Locator::Css(selector.to_string())).into_iter().collect()
}

fn fill_attributes(_driver: &mut dyn BrowserDriver, selector: &str) -> Vec<Locator> {
    let id = ID_HINT
        .captures(selector)
        .and_then(|c| c.get(1))
        .map(|m| Locator::Css(format!("#{}", m.as_str())));
    let name = NAME_HINT
        .captures(selector)
        .and_then(|c| c.get(1))
        .map(|m| Locator::Css(format!("[name='{}']", quote(m.as_str()))));
    id.into_iter().chain(name).collect()
}

fn fill_label(_driver: &mut dyn BrowserDriver, selector: &str) -> Vec<Locator> {
    let hint = PLACEHOLDER_HINT
        .captures(selector)
        .or_else(|| NAME_HINT.captures(selector))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| extract_label(selector));
    match hint {
        Some(h) if !h.is_empty() => vec![Locator::Label(h.clone()), Locator::Placeholder(h)],
        _ => Vec::new(),
    }
}

fn fill_first_textbox(driver: &mut dyn BrowserDriver, _selector: &str) -> Vec<Locator> {
    visible(driver, Locator::Css("input:not([type='hidden']):not([type='submit']):not([type='checkbox']):not([type='radio']), textarea".to_string()))
        .into_iter()
        .collect()
}

const FILL_LADDER: &[(&str, FillResolver)] = &[
    ("exact", fill_exact),
    ("attribute", fill_attributes),
    ("label", fill_label),
    ("first-textbox", fill_first_textbox),
];

/// Fill `selector` with `value`, falling back from the exact selector to
/// attribute hints, labels, placeholders, and finally the first visible textbox.
pub fn robust_fill(driver: &mut dyn BrowserDriver, selector: &str, value: &str) -> Result<&'static str> {
    let selector = selector.trim();
    for (name, resolve) in FILL_LADDER {
        for locator in resolve(driver, selector) {
            match driver.fill(&locator, value) {
                Ok(()) => {
                    debug!(rung = name, locator = %locator, "fill resolved");
                    return Ok(*name);
                }
                Err(e) => debug!(rung = name, "fill attempt failed: {}", e),
            }
        }
    }
    Err(EngineError::SelectorNotFound(selector.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Driver whose page contains exactly the locators listed as present.
    #[derive(Default)]
    struct Page {
        present: HashSet<String>,
        hidden: HashSet<String>,
        clicks: Vec<(String, bool)>,
        fills: Vec<(String, String)>,
    }

    impl Page {
        fn with(present: &[&str]) -> Self {
            Self {
                present: present.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl BrowserDriver for Page {
        fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        fn click(&mut self, locator: &Locator, force: bool) -> Result<()> {
            let key = locator.to_string();
            if self.present.contains(&key) || (force && self.hidden.contains(&key)) {
                self.clicks.push((key, force));
                Ok(())
            } else {
                Err(EngineError::SelectorNotFound(key))
            }
        }
        fn fill(&mut self, locator: &Locator, value: &str) -> Result<()> {
            let key = locator.to_string();
            if self.present.contains(&key) {
                self.fills.push((key, value.to_string()));
                Ok(())
            } else {
                Err(EngineError::SelectorNotFound(key))
            }
        }
        fn press(&mut self, _key: &str) -> Result<()> {
            Ok(())
        }
        fn screenshot(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn content(&mut self) -> Result<String> {
            Ok(String::new())
        }
        fn current_url(&mut self) -> String {
            String::new()
        }
        fn is_closed(&mut self) -> bool {
            false
        }
        fn reopen(&mut self) -> Result<()> {
            Ok(())
        }
        fn count(&mut self, _css: &str) -> usize {
            0
        }
        fn is_visible(&mut self, locator: &Locator) -> bool {
            self.present.contains(&locator.to_string())
        }
        fn scroll_by(&mut self, _dy: i64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_extract_label() {
        assert_eq!(extract_label("button:has-text('New repository')").as_deref(), Some("New repository"));
        assert_eq!(extract_label("text=Save changes").as_deref(), Some("Save changes"));
        assert_eq!(extract_label("Create project").as_deref(), Some("Create project"));
        assert_eq!(extract_label("button[type='submit']"), None);
        assert_eq!(extract_label("#login"), None);
        assert_eq!(extract_label(&"x".repeat(81)), None);
    }

    #[test]
    fn test_exact_selector_wins() {
        let mut page = Page::with(&["button#go"]);
        assert_eq!(robust_click(&mut page, "button#go").unwrap(), "exact");
        assert_eq!(page.clicks, vec![("button#go".to_string(), false)]);
    }

    #[test]
    fn test_plain_label_falls_to_text() {
        let mut page = Page::with(&["text=Create project"]);
        assert_eq!(robust_click(&mut page, "🔹 Create project").unwrap(), "text");
    }

    #[test]
    fn test_search_label_prefers_submit_button() {
        let mut page = Page::with(&["button[type='submit'], input[type='submit']", "text=Search"]);
        assert_eq!(robust_click(&mut page, "Search").unwrap(), "submit");
    }

    #[test]
    fn test_aria_label_link_before_text() {
        let mut page = Page::with(&["a[aria-label*='playwright' i]", "text=playwright"]);
        assert_eq!(robust_click(&mut page, "playwright").unwrap(), "aria-label");
    }

    #[test]
    fn test_role_and_href_rungs() {
        let mut page = Page::with(&["role=link[name~=Docs]"]);
        assert_eq!(robust_click(&mut page, "Docs").unwrap(), "role");

        let mut page = Page::with(&["a[href*='getting-started']"]);
        assert_eq!(robust_click(&mut page, "Getting started").unwrap(), "href");
    }

    #[test]
    fn test_forced_click_on_hidden_element() {
        let mut page = Page::default();
        page.hidden.insert("button.hidden-cta".to_string());
        assert_eq!(robust_click(&mut page, "button.hidden-cta").unwrap(), "forced");
        assert_eq!(page.clicks, vec![("button.hidden-cta".to_string(), true)]);
    }

    #[test]
    fn test_click_exhausted_is_selector_not_found() {
        let mut page = Page::default();
        let err = robust_click(&mut page, "button:has-text('Nope')").unwrap_err();
        assert!(matches!(err, EngineError::SelectorNotFound(s) if s.contains("Nope")));
    }

    #[test]
    fn test_fill_ladder() {
        let mut page = Page::with(&["#repository_name"]);
        assert_eq!(
            robust_fill(&mut page, "Repository name #repository_name (text)", "demo").unwrap(),
            "attribute"
        );
        assert_eq!(page.fills, vec![("#repository_name".to_string(), "demo".to_string())]);

        let mut page = Page::with(&["placeholder=Search packages"]);
        assert_eq!(
            robust_fill(&mut page, "input[placeholder*='Search packages']", "serde").unwrap(),
            "label"
        );

        let mut page = Page::with(&["label=Project name"]);
        assert_eq!(robust_fill(&mut page, "Project name", "x").unwrap(), "label");

        let textbox = "input:not([type='hidden']):not([type='submit']):not([type='checkbox']):not([type='radio']), textarea";
        let mut page = Page::with(&[textbox]);
        assert_eq!(robust_fill(&mut page, ".mystery", "x").unwrap(), "first-textbox");

        let mut page = Page::default();
        assert!(robust_fill(&mut page, ".mystery", "x").is_err());
    }
}
