//! Coarse task classification: what the user wants to do, and to what.
//!
//! Both lookups walk a fixed, ordered table and stop at the first pattern that
//! matches. Earlier entries are the more specific verbs, so the table order is
//! part of the behavior: "create account" is a `Create` task, not `Signup`.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Create,
    Filter,
    Signin,
    Signup,
    Download,
    Configure,
    View,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Create => "create",
            Intent::Filter => "filter",
            Intent::Signin => "signin",
            Intent::Signup => "signup",
            Intent::Download => "download",
            Intent::Configure => "configure",
            Intent::View => "view",
        }
    }

    /// Intents that change state inside an account workspace.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Intent::Create | Intent::Configure)
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Intent::Filter)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Project,
    Database,
    Account,
    Email,
    File,
    Repository,
    Issue,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Project => "project",
            Target::Database => "database",
            Target::Account => "account",
            Target::Email => "email",
            Target::File => "file",
            Target::Repository => "repository",
            Target::Issue => "issue",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn table<T: Copy>(entries: &[(T, &str)]) -> Vec<(T, Regex)> {
    entries
        .iter()
        .map(|(tag, pattern)| {
            let re = Regex::new(&format!(r"(?i)\b({pattern})\b")).expect("valid intent pattern");
            (*tag, re)
        })
        .collect()
}

static INTENT_PATTERNS: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    table(&[
        (Intent::Create, "create|new|add|start|build"),
        (Intent::Filter, "filter|search|find|query"),
        (Intent::Signin, "sign in|log in|login|signin"),
        (
            Intent::Signup,
            "sign up|signup|register|create account|get started|start trial|start free",
        ),
        (Intent::Download, "download|install|get"),
        (Intent::Configure, "configure|setup|set up|settings"),
        (Intent::View, "view|see|show|display|open"),
    ])
});

static TARGET_PATTERNS: LazyLock<Vec<(Target, Regex)>> = LazyLock::new(|| {
    table(&[
        (Target::Project, "project|workspace|initiative"),
        (Target::Database, "database|db|table|collection"),
        (Target::Account, "account|profile"),
        (Target::Email, "email|gmail|mail"),
        (Target::File, "file|document|doc"),
        (Target::Repository, "repository|repositories|repo|repos"),
        (Target::Issue, "issue|issues|ticket|bug"),
    ])
});

fn first_match<T: Copy>(patterns: &[(T, Regex)], text: &str) -> Option<T> {
    patterns
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(tag, _)| *tag)
}

/// Extract `(intent, target)` from a task. `None` means unconstrained.
pub fn extract(task: &str) -> (Option<Intent>, Option<Target>) {
    let task = task.to_lowercase();
    (
        first_match(&INTENT_PATTERNS, &task),
        first_match(&TARGET_PATTERNS, &task),
    )
}
