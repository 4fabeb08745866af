//! Relevance scoring for interactive elements.
//!
//! Disqualifying rules return a terminal score before any additive term is
//! computed, so a disqualified element can never outrank one that passed.

use crate::intent::{Intent, Target};
use crate::types::Candidate;

const NOISE_KEYWORDS: &[&str] = &[
    "cookie",
    "consent",
    "privacy",
    "terms",
    "legal",
    "footer",
    "header",
    "navigation",
    "menu",
    "newsroom",
    "blog",
    "about",
    "company",
    "careers",
    "pricing",
    "contact",
    "support",
    "help center",
    "documentation",
    "docs",
    "social",
    "twitter",
    "facebook",
    "linkedin",
    "follow",
    "subscribe",
];

const MARKETING_PHRASES: &[&str] = &[
    "learn more",
    "read more",
    "explore",
    "discover",
    "why",
    "what is",
];

const EXCLUDED_LABELS: &[&str] = &[
    "home",
    "pricing",
    "learn more",
    "read more",
    "explore",
    "discover",
    "why",
    "what is",
    "contact",
    "support",
    "help",
    "careers",
];

const ANNOUNCEMENT_MARKERS: &[&str] = &["announcement", "blog", "post", "article", "update:", "new:"];

const SIGNUP_PHRASES: &[&str] = &[
    "sign up",
    "create account",
    "create an account",
    "get started free",
    "start free trial",
    "join free",
    "try free",
    "register",
];

const SIGNIN_PHRASES: &[&str] = &["sign in", "log in", "login"];

const GENERIC_NAV_WORDS: &[&str] = &["next", "continue", "start", "get started", "try"];

const BUTTON_LABELS: &[&str] = &[
    "create", "new", "add", "filter", "search", "+", "submit", "continue", "next",
];

const MAX_LABEL_CHARS: usize = 40;

pub const DISQUALIFIED_EMPTY: i32 = -100;
pub const DISQUALIFIED_NOISE: i32 = -100;
pub const DISQUALIFIED_MARKETING: i32 = -50;
pub const DISQUALIFIED_GENERIC_LABEL: i32 = -60;
pub const DISQUALIFIED_TOO_LONG: i32 = -50;
pub const DISQUALIFIED_ANNOUNCEMENT: i32 = -50;
pub const SIGNUP_DURING_MUTATION: i32 = -90;
pub const SIGNIN_DURING_MUTATION: i32 = 70;
pub const GENERIC_NAV_DURING_MUTATION: i32 = -30;
pub const AUTH_DURING_SEARCH: i32 = -80;

/// At most this many clickable candidates survive ranking.
pub const MAX_CANDIDATES: usize = 5;

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Rules 1-6: reasons an element is never worth clicking, whatever the task.
fn disqualification(el: &str) -> Option<i32> {
    if el.is_empty() {
        return Some(DISQUALIFIED_EMPTY);
    }
    if contains_any(el, NOISE_KEYWORDS) {
        return Some(DISQUALIFIED_NOISE);
    }
    if contains_any(el, MARKETING_PHRASES) {
        return Some(DISQUALIFIED_MARKETING);
    }
    if EXCLUDED_LABELS.contains(&el) {
        return Some(DISQUALIFIED_GENERIC_LABEL);
    }
    if el.chars().count() > MAX_LABEL_CHARS {
        return Some(DISQUALIFIED_TOO_LONG);
    }
    if contains_any(el, ANNOUNCEMENT_MARKERS) {
        return Some(DISQUALIFIED_ANNOUNCEMENT);
    }
    None
}

/// Rules 7-8: intent-specific verdicts on authentication and navigation controls.
fn intent_verdict(el: &str, word_count: usize, intent: Option<Intent>) -> Option<i32> {
    let intent = intent?;
    if intent.is_mutating() {
        if contains_any(el, SIGNUP_PHRASES) {
            return Some(SIGNUP_DURING_MUTATION);
        }
        if contains_any(el, SIGNIN_PHRASES) && word_count <= 3 {
            return Some(SIGNIN_DURING_MUTATION);
        }
        if GENERIC_NAV_WORDS.contains(&el) {
            return Some(GENERIC_NAV_DURING_MUTATION);
        }
    }
    if intent.is_search()
        && contains_any(el, &["sign in", "log in", "login", "sign up", "create account"])
    {
        return Some(AUTH_DURING_SEARCH);
    }
    None
}

fn intent_keyword_score(el: &str, word_count: usize, intent: Option<Intent>) -> i32 {
    match intent {
        Some(Intent::Create) if contains_any(el, &["create", "new", "add", "+"]) => {
            if word_count <= 4 { 50 } else { 10 }
        }
        Some(Intent::Filter) if contains_any(el, &["filter", "search", "find"]) => 50,
        Some(Intent::Signup)
            if contains_any(el, &["sign up", "get started", "start free", "try", "register"]) =>
        {
            if word_count <= 5 { 50 } else { 10 }
        }
        Some(Intent::Signin) if contains_any(el, SIGNIN_PHRASES) => 50,
        Some(Intent::Download) if contains_any(el, &["download", "install"]) => 50,
        _ => 0,
    }
}

fn target_keyword_score(el: &str, word_count: usize, target: Option<Target>) -> i32 {
    match target {
        Some(Target::Project) if el.contains("project") => {
            if word_count <= 4 { 40 } else { 10 }
        }
        Some(Target::Database) if contains_any(el, &["database", "table"]) => 30,
        Some(Target::Account) if el.contains("account") => 30,
        _ => 0,
    }
}

fn canonical_phrase_score(el: &str, intent: Option<Intent>, target: Option<Target>) -> i32 {
    let mut score = 0;
    let creating = |kw: &str| el.contains(kw) && contains_any(el, &["create", "new", "add"]);
    match (intent, target) {
        (Some(Intent::Create), Some(Target::Project)) => {
            if ["create project", "new project", "add project", "+", "create", "new"].contains(&el) {
                score += 80;
            }
            if creating("project") {
                score += 60;
            }
        }
        (Some(Intent::Create), Some(Target::Repository)) => {
            if ["create repository", "new repository", "new repo", "new", "+", "create"]
                .contains(&el)
            {
                score += 80;
            }
            if creating("repositor") {
                score += 60;
            }
        }
        _ => {}
    }
    score
}

/// Score an element's combined text (visible text, aria-label, title) for a task.
/// Higher is more relevant; the number only means something relative to others.
pub fn score_element(text: &str, intent: Option<Intent>, target: Option<Target>, _task: &str) -> i32 {
    let el = text.trim().to_lowercase();
    if let Some(score) = disqualification(&el) {
        return score;
    }

    let word_count = el.split_whitespace().count();
    if let Some(score) = intent_verdict(&el, word_count, intent) {
        return score;
    }

    let mut score = intent_keyword_score(&el, word_count, intent)
        + target_keyword_score(&el, word_count, target);

    if let (Some(i), Some(t)) = (intent, target)
        && el.contains(i.as_str())
        && el.contains(t.as_str())
    {
        score += if word_count <= 4 { 60 } else { 20 };
    }

    // single words get the same bonus as short labels
    if word_count <= 3 {
        score += 10;
    } else if word_count > 10 {
        score -= 20;
    }

    if BUTTON_LABELS.contains(&el.as_str()) {
        score += 30;
    }

    score + canonical_phrase_score(&el, intent, target)
}

/// Minimum score a candidate needs before the planner will consider clicking it.
pub fn threshold(intent: Option<Intent>) -> i32 {
    match intent {
        Some(Intent::Filter) => 25,
        Some(Intent::Create | Intent::Signup | Intent::Signin) => 35,
        _ => 20,
    }
}

/// Raw element facts collected from a DOM snapshot.
#[derive(Debug, Clone, Default)]
pub struct ElementText {
    pub text: String,
    pub aria_label: String,
    pub title: String,
    pub tag: String,
}

impl ElementText {
    fn combined(&self) -> String {
        [&self.text, &self.aria_label, &self.title]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn label(&self) -> &str {
        [&self.text, &self.aria_label, &self.title]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Score every element, keep those above the intent threshold, best first, top five.
pub fn rank_candidates(
    elements: &[ElementText],
    intent: Option<Intent>,
    target: Option<Target>,
    task: &str,
) -> Vec<Candidate> {
    let min = threshold(intent);
    let mut candidates: Vec<Candidate> = elements
        .iter()
        .filter_map(|el| {
            let full = el.combined();
            if full.is_empty() {
                return None;
            }
            let score = score_element(&full, intent, target, task);
            (score >= min).then(|| Candidate {
                text: el.label().to_string(),
                score,
                tag: el.tag.clone(),
                aria_label: el.aria_label.clone(),
            })
        })
        .collect();

    // stable sort keeps document order among ties
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}
