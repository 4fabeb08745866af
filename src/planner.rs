//! Heuristic step planner.
//!
//! Used as the initial seed when no LLM planner is configured (or it returns
//! nothing). Reads a DOM snapshot with `scraper`, ranks clickable elements with
//! [`crate::scorer`], discovers a fillable input, and assembles a short plan.

use chrono::Local;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::intent::{self, Intent, Target};
use crate::scorer::{self, ElementText};
use crate::types::{Action, Candidate, InputCandidate, Step};

/// Task phrases that mean the work happens inside an account.
pub const AUTH_KEYWORDS: &[&str] = &[
    "create project",
    "create repository",
    "new repository",
    "new project",
    "configure",
    "settings",
    "setup",
    "initialize",
    "delete repository",
    "delete project",
    "manage repository",
    "manage project",
];

/// Broader verbs for which an exploratory click toward the app is worthwhile.
pub const CREATION_AUTH_KEYWORDS: &[&str] = &[
    "create",
    "configure",
    "settings",
    "new repository",
    "new project",
    "setup",
    "initialize",
];

const WORKSPACE_INDICATORS: &[&str] = &[
    "dashboard",
    "workspace",
    "new project",
    "new repository",
    "create project",
    "create repository",
    "settings",
    "profile",
];

const INPUT_NOISE: &[&str] = &[
    "newsletter",
    "subscribe",
    "email",
    "footer",
    "header",
    "nav",
    "cookie",
    "consent",
    "privacy",
    "marketing",
    "promo",
];

const MAX_INPUTS: usize = 3;

pub const SIGN_IN_SELECTOR: &str = "a:has-text('Sign in'), button:has-text('Sign in'), a:has-text('Log in'), button:has-text('Log in')";
pub const SUBMIT_SELECTOR: &str = "button[type='submit'], button:has-text('Search'), button:has-text('Submit'), button:has-text('Create'), button:has-text('Save'), button:has-text('Continue'), button:has-text('Next'), button:has-text('Done')";
pub const GENERIC_SEARCH_INPUT: &str =
    "input[type='search'], [role='searchbox'], input[placeholder*='search' i]";
const EXPLORE_CTA_SELECTOR: &str = "button:has-text('Get started'), a:has-text('Get started'), button:has-text('Try'), a:has-text('Try'), button:has-text('Explore'), a:has-text('Explore')";

static SIGN_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(sign in|log in|login)\b").expect("valid sign-in regex"));
static NON_CREATION_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)assign|search|filter|find").expect("valid hint regex"));
static SEARCH_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"search (?:for|and open)\s+([a-z0-9._-]+)").expect("valid search regex")
});
static OPEN_X: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"open\s+([a-z0-9._-]+)").expect("valid open regex"));
static FILTER_FOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filter.*?for\s+([a-z0-9._-]+)").expect("valid filter regex"));
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-z0-9._-]{3,})\b").expect("valid token regex"));
static FULL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"));
static DOMAIN_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|in|at|on)\s+([a-z0-9.-]+\.(?:com|org|io|app|net|co|ai|so))\b")
        .expect("valid domain regex")
});

const SEARCH_STOP_WORDS: &[&str] = &[
    "search", "open", "for", "and", "the", "in", "on", "from", "how", "to", "create", "filter",
];

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

static CLICKABLE: LazyLock<Selector> = LazyLock::new(|| {
    sel("button, a, [role='button'], [role='link'], input[type='submit']")
});
static FIELDS: LazyLock<Selector> = LazyLock::new(|| sel("input, textarea"));
static SEARCHABLE: LazyLock<Selector> = LazyLock::new(|| sel("input, [role='searchbox']"));
static PASSWORD: LazyLock<Selector> = LazyLock::new(|| sel("input[type='password']"));
static LABELS: LazyLock<Selector> = LazyLock::new(|| sel("label[for]"));

/// A page snapshot plus the derived facts the planner consults.
struct PageView {
    doc: Html,
    text_lower: String,
}

impl PageView {
    fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);
        let text_lower = doc.root_element().text().collect::<String>().to_lowercase();
        Self { doc, text_lower }
    }

    fn mentions_sign_in(&self) -> bool {
        self.doc
            .root_element()
            .text()
            .any(|t| SIGN_IN_TEXT.is_match(t))
    }

    fn has_password_field(&self) -> bool {
        self.doc.select(&PASSWORD).next().is_some()
    }

    fn elements(&self) -> Vec<ElementText> {
        self.doc
            .select(&CLICKABLE)
            .map(|el| ElementText {
                text: visible_text(&el),
                aria_label: attr(&el, "aria-label"),
                title: attr(&el, "title"),
                tag: el.value().name().to_string(),
            })
            .collect()
    }

    fn label_for(&self, id: &str) -> Option<String> {
        self.doc
            .select(&LABELS)
            .find(|l| l.value().attr("for") == Some(id))
            .map(|l| visible_text(&l))
            .filter(|t| !t.is_empty())
    }
}

fn attr(el: &ElementRef, name: &str) -> String {
    el.value().attr(name).unwrap_or("").trim().to_string()
}

fn visible_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Pull a search term out of the task ("search for playwright in npm" -> "playwright").
pub fn extract_search_term(task: &str) -> Option<String> {
    let task = task.to_lowercase();
    let capture = |re: &Regex| {
        re.captures(&task)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    let patterned = if task.contains("search for") || task.contains("search and open") {
        capture(&SEARCH_FOR)
    } else if task.contains("open") && task.contains("in") {
        capture(&OPEN_X)
    } else if task.contains("filter") {
        capture(&FILTER_FOR)
    } else {
        None
    };

    patterned.or_else(|| {
        TOKEN
            .captures_iter(&task)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|t| !SEARCH_STOP_WORDS.contains(t))
            .map(str::to_string)
    })
}

/// Starting URL named in the task itself: a full URL, or "on github.com" style.
pub fn explicit_url(task: &str) -> Option<String> {
    if let Some(m) = FULL_URL.find(task) {
        return Some(m.as_str().to_string());
    }
    DOMAIN_REF
        .captures(task)
        .and_then(|c| c.get(1))
        .map(|m| format!("https://{}", m.as_str().to_lowercase()))
}

/// Pick a value for a field based on what its hint says it is.
pub fn synthesize_value(
    hint: &str,
    input_type: &str,
    task: &str,
    target: Option<Target>,
) -> String {
    let hint = hint.to_lowercase();
    let target_name = target.map(|t| t.as_str()).unwrap_or("item");

    if hint.contains("email") || input_type == "email" {
        "test@example.com".to_string()
    } else if hint.contains("name") && hint.contains("first") {
        "Test".to_string()
    } else if hint.contains("name") && hint.contains("last") {
        "User".to_string()
    } else if hint.contains("password") || input_type == "password" {
        "TestPass123!".to_string()
    } else if hint.contains("phone") || input_type == "tel" {
        "+1234567890".to_string()
    } else if ["search", "query", "filter"].iter().any(|k| hint.contains(k)) || input_type == "search" {
        extract_search_term(task).unwrap_or_else(|| "test".to_string())
    } else if ["name", "title", "project"].iter().any(|k| hint.contains(k)) {
        let target_name = target.map(|t| t.as_str()).unwrap_or("Item");
        format!("Auto {} {}", target_name, Local::now().format("%H%M%S"))
    } else if hint.contains("description") || hint.contains("desc") {
        format!("Sample description for {target_name}")
    } else {
        "Test input".to_string()
    }
}

fn find_search_inputs(page: &PageView, inputs: &mut Vec<InputCandidate>) {
    for inp in page.doc.select(&SEARCHABLE) {
        let v = inp.value();
        let input_type = v.attr("type").unwrap_or("text").to_lowercase();
        let role = v.attr("role").unwrap_or("");
        let name = attr(&inp, "name");
        let placeholder = attr(&inp, "placeholder");
        let aria = attr(&inp, "aria-label");
        let id = attr(&inp, "id");

        let is_search = input_type == "search"
            || role == "searchbox"
            || placeholder.to_lowercase().contains("search")
            || aria.to_lowercase().contains("search");
        if !is_search {
            continue;
        }

        let hint = [&placeholder, &aria, &name]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "search".to_string());

        let selector = if v.name() == "input" && input_type == "search" {
            Some("input[type='search']".to_string())
        } else if role == "searchbox" {
            Some("[role='searchbox']".to_string())
        } else if !name.is_empty() {
            Some(format!("input[name='{name}']"))
        } else if !id.is_empty() {
            Some(format!("#{id}"))
        } else if !placeholder.is_empty() {
            Some(format!("input[placeholder*='{}']", truncate(&placeholder, 30)))
        } else {
            None
        };

        if let Some(selector) = selector
            && !inputs.iter().any(|i| i.selector == selector)
        {
            inputs.push(InputCandidate {
                selector,
                hint,
                input_type,
            });
        }
    }
}

fn find_form_inputs(
    page: &PageView,
    intent: Option<Intent>,
    target: Option<Target>,
) -> Vec<InputCandidate> {
    let mut inputs = Vec::new();
    if intent.is_some_and(|i| i.is_search()) {
        find_search_inputs(page, &mut inputs);
    }

    let creating_project = intent == Some(Intent::Create) && target == Some(Target::Project);

    for inp in page.doc.select(&FIELDS) {
        let v = inp.value();
        let input_type = v.attr("type").unwrap_or("text").to_lowercase();
        if ["hidden", "submit", "button", "checkbox", "radio"].contains(&input_type.as_str()) {
            continue;
        }

        let name = attr(&inp, "name");
        let placeholder = attr(&inp, "placeholder");
        let aria = attr(&inp, "aria-label");
        let id = attr(&inp, "id");

        let label = (!id.is_empty()).then(|| page.label_for(&id)).flatten();
        let Some(hint) = label
            .or_else(|| [&placeholder, &aria, &name].into_iter().find(|s| !s.is_empty()).cloned())
        else {
            continue;
        };
        let hint_lower = hint.to_lowercase();

        if INPUT_NOISE.iter().any(|n| hint_lower.contains(n)) {
            continue;
        }
        if intent.is_some_and(|i| i.is_mutating())
            && ["assign", "search", "filter", "find"].iter().any(|k| hint_lower.contains(k))
        {
            continue;
        }
        // account fields embedded on a project page belong to some other form
        if creating_project
            && (["password", "email", "account", "username"].iter().any(|k| hint_lower.contains(k))
                || input_type == "password")
        {
            continue;
        }

        let scoped_to_chrome = inp
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| p.html().to_lowercase())
            .is_some_and(|html| {
                ["footer", "header", "nav", "sidebar"].iter().any(|s| html.contains(s))
            });
        if scoped_to_chrome {
            continue;
        }

        let mut selector = if !name.is_empty() {
            Some(format!("{}[name='{name}']", v.name()))
        } else if !id.is_empty() && !INPUT_NOISE.iter().any(|n| id.to_lowercase().contains(n)) {
            Some(format!("#{id}"))
        } else if !placeholder.is_empty() {
            Some(format!("input[placeholder*='{}']", truncate(&placeholder, 30)))
        } else {
            None
        };

        if selector.is_none()
            && intent.is_some_and(|i| i.is_search())
            && input_type == "text"
            && ["search", "find", "query", "filter", "packages"].iter().any(|k| hint_lower.contains(k))
        {
            selector = Some("input[placeholder*='search' i], input[name*='search' i], input[type='search']".to_string());
        }

        if let Some(selector) = selector
            && !inputs.iter().any(|i| i.selector == selector)
        {
            inputs.push(InputCandidate {
                selector,
                hint,
                input_type,
            });
        }
    }

    inputs.truncate(MAX_INPUTS);
    inputs
}

fn candidate_selector(candidate: &Candidate) -> String {
    if candidate.aria_label.is_empty() {
        format!("{}:has-text('{}')", candidate.tag, candidate.text)
    } else {
        format!(
            "{}[aria-label*='{}']",
            candidate.tag,
            truncate(&candidate.aria_label, 30)
        )
    }
}

fn is_submit_label(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    ["search", "submit", "go", "find"].contains(&t.as_str())
}

fn sign_in_steps() -> [Step; 2] {
    [
        Step::click("Click Sign in to authenticate", SIGN_IN_SELECTOR),
        Step::wait("Wait for login page", "body"),
    ]
}

/// Assemble an ordered plan for `task` from a DOM snapshot.
///
/// `authenticated` is authoritative when set; otherwise workspace keywords in
/// the page text decide whether the session already looks signed in.
pub fn generate_steps(
    task: &str,
    _url: Option<&str>,
    html: Option<&str>,
    authenticated: bool,
) -> Vec<Step> {
    let Some(html) = html.filter(|h| !h.trim().is_empty()) else {
        return vec![
            Step::wait("Wait for page load", "body"),
            Step::scroll("Capture initial state"),
        ];
    };

    let page = PageView::parse(html);
    let (intent, target) = intent::extract(task);
    debug!(intent = ?intent, target = ?target, "Detected task intent");

    let task_lower = task.to_lowercase();
    let task_needs_auth = AUTH_KEYWORDS.iter().any(|k| task_lower.contains(k));
    let mutating = intent.is_some_and(|i| i.is_mutating());
    let workspace_present =
        authenticated || WORKSPACE_INDICATORS.iter().any(|w| page.text_lower.contains(w));

    let mut steps = Vec::new();

    let mut sign_in_injected = false;
    if task_needs_auth
        && mutating
        && !workspace_present
        && page.mentions_sign_in()
        && !page.has_password_field()
    {
        steps.extend(sign_in_steps());
        sign_in_injected = true;
    }

    let mut candidates = scorer::rank_candidates(&page.elements(), intent, target, task);
    if workspace_present {
        let before = candidates.len();
        candidates.retain(|c| !SIGN_IN_TEXT.is_match(&c.text));
        if candidates.len() != before {
            debug!("Filtered sign-in controls post-auth ({} -> {})", before, candidates.len());
        }
    }
    if let Some(top) = candidates.first() {
        debug!("Found {} clickable elements, top: '{}'", candidates.len(), top.text);
    }

    let mut inputs = find_form_inputs(&page, intent, target);
    if mutating {
        inputs.retain(|i| !NON_CREATION_HINT.is_match(&i.hint));
    }
    if let Some(top) = inputs.first() {
        debug!("Found {} input fields, top: '{}'", inputs.len(), top.hint);
    }

    if candidates.is_empty() && task_needs_auth && mutating && page.mentions_sign_in() {
        if !sign_in_injected {
            steps.push(Step::wait("Capture initial state", "body"));
            steps.push(Step::click("Click Sign in to access app", SIGN_IN_SELECTOR));
            steps.push(Step::wait("Wait for login page to load", "body"));
        }
        return steps;
    }

    steps.push(Step::wait("Capture initial page state", "body"));

    let creation_auth_needed = CREATION_AUTH_KEYWORDS.iter().any(|k| task_lower.contains(k));
    if intent == Some(Intent::Create)
        && candidates.is_empty()
        && creation_auth_needed
        && !workspace_present
    {
        if page.mentions_sign_in() {
            steps.push(Step::click(
                "Click Sign in to authenticate and reach app area",
                SIGN_IN_SELECTOR,
            ));
            steps.push(Step::wait("Wait for auth page or dashboard", "body"));
        } else {
            steps.push(Step::click(
                "Explore primary CTA to reach application",
                EXPLORE_CTA_SELECTOR,
            ));
            steps.push(Step::wait("Wait for potential navigation", "body"));
        }
    }

    let searching = intent.is_some_and(|i| i.is_search());
    let fill = inputs.first().map(|inp| {
        let value = synthesize_value(&inp.hint, &inp.input_type, task, target);
        Step::fill(format!("Type '{value}' in {}", inp.hint), &inp.selector, value)
    });

    // One click only: compounding an uncertain first guess rarely helps.
    let click = candidates
        .first()
        .filter(|c| !(searching && fill.is_some() && is_submit_label(&c.text)))
        .map(|c| {
            Step::click(
                format!(
                    "Click '{}' to {} {}",
                    c.text,
                    intent.map(|i| i.as_str()).unwrap_or("open"),
                    target.map(|t| t.as_str()).unwrap_or("item")
                ),
                candidate_selector(c),
            )
        });

    // A search box has to be typed into before anything is clicked.
    if searching {
        steps.extend(fill.clone());
        steps.extend(click);
    } else {
        steps.extend(click);
        steps.extend(fill.clone());
    }

    if fill.is_some() {
        steps.push(Step::click("Submit search/form", SUBMIT_SELECTOR));
    }

    if searching && inputs.is_empty() {
        let term = extract_search_term(task).unwrap_or_else(|| "test".to_string());
        steps.push(Step::click("Focus generic search field", GENERIC_SEARCH_INPUT));
        steps.push(Step::fill(
            format!("Type '{term}' in search field"),
            GENERIC_SEARCH_INPUT,
            term,
        ));
        steps.push(Step::click(
            "Submit search",
            "button:has-text('Search'), button[type='submit']",
        ));
        steps.push(Step::wait("Wait for results state", "body"));
    }

    let actionable = steps
        .iter()
        .any(|s| matches!(s.action, Action::Click | Action::Fill));
    if !actionable {
        steps.push(Step::scroll("Scroll to explore page"));
        steps.push(Step::scroll("Scroll to explore page"));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(steps: &[Step]) -> Vec<Action> {
        steps.iter().map(|s| s.action).collect()
    }

    #[test]
    fn test_no_html_gives_minimal_plan() {
        let steps = generate_steps("create project", None, None, false);
        assert_eq!(actions(&steps), vec![Action::Wait, Action::Scroll]);
        assert_eq!(steps[0].selector_str(), "body");

        let steps = generate_steps("create project", None, Some("   "), false);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_create_repository_starts_with_sign_in() {
        let html = r#"<html><body>
            <header><a href="/login">Sign in</a></header>
            <main><form action="/subscribe"><input type="text" name="q" placeholder="Search or jump to"></form>
            <h1>Build software better, together</h1></main>
        </body></html>"#;
        let steps = generate_steps("create repository in github", None, Some(html), false);
        assert_eq!(steps[0].action, Action::Click);
        assert_eq!(steps[0].selector_str(), SIGN_IN_SELECTOR);
        assert_eq!(steps[1].action, Action::Wait);
    }

    #[test]
    fn test_no_sign_in_when_password_field_visible() {
        let html = r#"<html><body><a>Sign in</a>
            <form><input type="email" name="login"><input type="password" name="pw"></form>
        </body></html>"#;
        let steps = generate_steps("create repository in github", None, Some(html), false);
        assert!(steps.iter().all(|s| s.selector_str() != SIGN_IN_SELECTOR || s.description.contains("access")));
        assert_ne!(steps[0].description, "Click Sign in to authenticate");
    }

    #[test]
    fn test_authenticated_flag_suppresses_sign_in() {
        let html = r#"<html><body><a>Sign in</a><button>New repository</button></body></html>"#;
        let steps = generate_steps("create repository in github", None, Some(html), true);
        assert!(steps.iter().all(|s| !s.selector_str().contains("Sign in")));
        let click = steps.iter().find(|s| s.action == Action::Click).unwrap();
        assert_eq!(click.selector_str(), "button:has-text('New repository')");
    }

    #[test]
    fn test_search_fills_before_submit() {
        let html = r#"<html><body>
            <div><input type="search" placeholder="Search packages" name="q"></div>
            <button type="submit">Search</button>
        </body></html>"#;
        let steps = generate_steps("search for playwright in npm", None, Some(html), false);
        let fill_at = steps.iter().position(|s| s.action == Action::Fill).unwrap();
        assert_eq!(steps[fill_at].value.as_deref(), Some("playwright"));
        let first_click = steps.iter().position(|s| s.action == Action::Click).unwrap();
        assert!(fill_at < first_click);
        assert_eq!(steps[first_click].selector_str(), SUBMIT_SELECTOR);
    }

    #[test]
    fn test_searchbox_role_input() {
        let html = r#"<html><body><div role="searchbox" aria-label="Find"></div>
            <input role="searchbox" aria-label="Search npm"></body></html>"#;
        let steps = generate_steps("search for playwright in npm", None, Some(html), false);
        let fill = steps.iter().find(|s| s.action == Action::Fill).unwrap();
        assert_eq!(fill.selector_str(), "[role='searchbox']");
        assert_eq!(fill.value.as_deref(), Some("playwright"));
    }

    #[test]
    fn test_search_without_inputs_synthesizes_generic_search() {
        let html = r#"<html><body><p>Nothing to type into</p></body></html>"#;
        let steps = generate_steps("search for serde in crates.io", None, Some(html), false);
        let fill = steps.iter().find(|s| s.action == Action::Fill).unwrap();
        assert_eq!(fill.selector_str(), GENERIC_SEARCH_INPUT);
        assert_eq!(fill.value.as_deref(), Some("serde"));
        assert_eq!(steps.last().unwrap().action, Action::Wait);
    }

    #[test]
    fn test_nothing_actionable_scrolls() {
        let html = r#"<html><body><p>Just words</p></body></html>"#;
        let steps = generate_steps("view the page", None, Some(html), false);
        let tail: Vec<Action> = actions(&steps).into_iter().rev().take(2).collect();
        assert_eq!(tail, vec![Action::Scroll, Action::Scroll]);
    }

    #[test]
    fn test_single_click_and_single_fill() {
        let html = r#"<html><body><main>
            <button>New project</button><button>Create</button><button>Add</button>
            <form><input id="pname" type="text"><label for="pname">Project name</label>
            <textarea name="description" placeholder="Description"></textarea></form>
        </main></body></html>"#;
        let steps = generate_steps("create a new project in linear.app", None, Some(html), true);
        let clicks: Vec<&Step> = steps.iter().filter(|s| s.action == Action::Click).collect();
        let fills: Vec<&Step> = steps.iter().filter(|s| s.action == Action::Fill).collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].selector_str(), "#pname");
        assert!(fills[0].value.as_deref().unwrap().starts_with("Auto project "));
        // one candidate click plus the submit
        assert_eq!(clicks.len(), 2);
        assert_eq!(clicks[0].selector_str(), "button:has-text('New project')");
        assert_eq!(clicks[1].selector_str(), SUBMIT_SELECTOR);
    }

    #[test]
    fn test_create_project_skips_credential_inputs() {
        let html = r#"<html><body><section>
            <input name="username" placeholder="Username">
            <input type="password" name="pass" placeholder="Secret">
        </section></body></html>"#;
        let steps = generate_steps("create project", None, Some(html), true);
        assert!(steps.iter().all(|s| s.action != Action::Fill));
    }

    #[test]
    fn test_extract_search_term_patterns() {
        assert_eq!(extract_search_term("Search for playwright in npm").as_deref(), Some("playwright"));
        assert_eq!(extract_search_term("search and open requests on pypi").as_deref(), Some("requests"));
        assert_eq!(extract_search_term("open lodash in npm").as_deref(), Some("lodash"));
        assert_eq!(extract_search_term("filter issues for bugs").as_deref(), Some("bugs"));
        assert_eq!(extract_search_term("find tokio").as_deref(), Some("find"));
        assert_eq!(extract_search_term("to in on"), None);
    }

    #[test]
    fn test_synthesize_value_by_hint() {
        assert_eq!(synthesize_value("Email address", "text", "", None), "test@example.com");
        assert_eq!(synthesize_value("First name", "text", "", None), "Test");
        assert_eq!(synthesize_value("Last name", "text", "", None), "User");
        assert_eq!(synthesize_value("pw", "password", "", None), "TestPass123!");
        assert_eq!(synthesize_value("Search", "text", "search for axum", None), "axum");
        assert_eq!(
            synthesize_value("Description", "text", "", Some(Target::Issue)),
            "Sample description for issue"
        );
        assert_eq!(synthesize_value("Color", "text", "", None), "Test input");
        assert!(synthesize_value("Title", "text", "", None).starts_with("Auto Item "));
    }

    #[test]
    fn test_explicit_url() {
        assert_eq!(
            explicit_url("open https://example.com/path now").as_deref(),
            Some("https://example.com/path")
        );
        assert_eq!(
            explicit_url("Search for playwright in npmjs.com").as_deref(),
            Some("https://npmjs.com")
        );
        assert_eq!(explicit_url("search for playwright in npm"), None);
    }
}
