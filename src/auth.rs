//! Credential resolution and a heuristic login flow.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Timings;
use crate::error::EngineError;
use crate::hands::{BrowserDriver, Locator};
use crate::resolve;

/// Verbs that usually mean the task changes account state.
const AUTH_VERBS: &[&str] = &[
    "create", "add", "delete", "remove", "edit", "configure", "manage", "upload", "post", "publish",
];

const LOGIN_PATHS: &[&str] = &[
    "/login",
    "/signin",
    "/auth/login",
    "/users/sign_in",
    "/account/login",
    "/user/login",
    "/auth",
    "/session/new",
];

const PASSWORD_FIELD: &str = "input[type='password']";
const IDENTITY_FIELD: &str = "input[type='email'], input[type='text'][name*='user'], input[type='text'][name*='email'], input[type='text'][name*='login'], input[autocomplete='username']";
const SIGN_IN_LINKS: &str = "a:has-text('Sign in'), a:has-text('Log in'), button:has-text('Sign in'), button:has-text('Log in'), [href*='/login'], [href*='/signin']";
const LOGIN_SUBMIT: &str = "button[type='submit'], input[type='submit'], button:has-text('Sign in'), button:has-text('Log in'), button:has-text('Continue'), button:has-text('Next')";
const SIGNED_IN_MARKERS: &str = "a:has-text('Sign out'), button:has-text('Sign out'), a:has-text('Log out'), button:has-text('Log out'), [aria-label*='profile' i], [aria-label*='account' i]";

/// Multi-page logins (email, then password) get a few passes.
const LOGIN_PASSES: usize = 3;

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which value an interactive prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptField {
    Email,
    Password,
}

/// Authentication collaborator used by the engine before and during a run.
pub trait Authenticator {
    fn requires_authentication(&self, task: &str, url: &str) -> bool;
    fn credentials(&self, url: &str, task: &str) -> Option<Credentials>;
    /// Log in on the current page. `true` only when signed-in markers appear.
    fn attempt_login(&self, driver: &mut dyn BrowserDriver, creds: &Credentials, timings: &Timings) -> bool;
    fn login_urls(&self, url: &str) -> Vec<String> {
        login_urls(url)
    }
    /// Ask the operator for a value. `None` when running non-interactively.
    fn prompt(&self, field: PromptField) -> Option<String>;
}

pub fn task_requires_authentication(task: &str) -> bool {
    let task = task.to_lowercase();
    AUTH_VERBS.iter().any(|v| task.contains(v))
}

/// Demo and example sites never need a login.
pub fn is_demo_site(url: &str) -> bool {
    let url = url.to_lowercase();
    ["todomvc", "example", "demo"].iter().any(|k| url.contains(k))
}

pub fn domain_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_string())
}

pub fn login_urls(url: &str) -> Vec<String> {
    let Some(domain) = domain_from_url(url) else {
        return Vec::new();
    };
    LOGIN_PATHS
        .iter()
        .map(|path| format!("https://{domain}{path}"))
        .collect()
}

/// A visible password field next to an email/username field.
pub fn is_login_like(driver: &mut dyn BrowserDriver) -> bool {
    driver.count(PASSWORD_FIELD) > 0 && driver.count(IDENTITY_FIELD) > 0
}

/// `github` for `www.github.com`.
fn brand(domain: &str) -> &str {
    let host = domain.strip_prefix("www.").unwrap_or(domain);
    host.split('.').next().unwrap_or(host)
}

/// `GITHUB_COM` for `github.com`.
fn domain_key(domain: &str) -> String {
    domain.to_uppercase().replace(['.', '-'], "_")
}

/// Look credentials up by full domain, then by brand (first label), in a
/// `{"github.com": {"email": ..., "password": ...}}` file.
pub fn credentials_from_json(path: &Path, domain: &str) -> Option<Credentials> {
    let raw = std::fs::read_to_string(path).ok()?;
    let table: HashMap<String, Credentials> = match serde_json::from_str(&raw) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not parse {}: {}", path.display(), e);
            return None;
        }
    };
    table
        .get(domain)
        .or_else(|| table.get(brand(domain)))
        .filter(|c| !c.email.is_empty() && !c.password.is_empty())
        .cloned()
}

/// Resolution order: explicit overrides, `<DOMAIN>_EMAIL`/`_PASSWORD`,
/// `<BRAND>_EMAIL`/`_PASSWORD`, then the `CREDENTIALS_JSON` file.
pub fn resolve_credentials(
    url: &str,
    overrides: (Option<&str>, Option<&str>),
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<Credentials> {
    let domain = domain_from_url(url)?;

    if let (Some(email), Some(password)) = overrides
        && !email.is_empty()
        && !password.is_empty()
    {
        return Some(Credentials { email: email.to_string(), password: password.to_string() });
    }

    let non_empty = |key: String| lookup(&key).filter(|v| !v.is_empty());

    let key = domain_key(&domain);
    let mut email = non_empty(format!("{key}_EMAIL"));
    let mut password = non_empty(format!("{key}_PASSWORD"));
    if let (Some(e), Some(p)) = (&email, &password) {
        info!("✓ Using {} credentials from environment", key);
        return Some(Credentials { email: e.clone(), password: p.clone() });
    }

    let brand = brand(&domain).to_uppercase();
    email = non_empty(format!("{brand}_EMAIL")).or(email);
    password = non_empty(format!("{brand}_PASSWORD")).or(password);
    if let (Some(email), Some(password)) = (email, password) {
        info!("✓ Using {} credentials from environment", brand);
        return Some(Credentials { email, password });
    }

    let path = lookup("CREDENTIALS_JSON")?;
    let creds = credentials_from_json(Path::new(&path), &domain)?;
    info!("✓ Using credentials from {}", path);
    Some(creds)
}

/// Authenticator backed by CLI overrides, environment variables and, when
/// allowed, terminal prompts.
#[derive(Debug, Clone, Default)]
pub struct EnvAuthenticator {
    pub email: Option<String>,
    pub password: Option<String>,
    pub interactive: bool,
}

impl EnvAuthenticator {
    fn prompt_credentials(&self, url: &str, task: &str) -> Option<Credentials> {
        let site = domain_from_url(url).unwrap_or_else(|| url.to_string());
        eprintln!("\n⚠ Authentication required\nSite: {site}\nTask: {task}");
        eprintln!(
            "Tip: set {0}_EMAIL and {0}_PASSWORD (or {1}_EMAIL and {1}_PASSWORD) in .env to skip this prompt\n",
            domain_key(&site),
            brand(&site).to_uppercase()
        );
        let email = self.prompt(PromptField::Email)?;
        let password = self.prompt(PromptField::Password)?;
        Some(Credentials { email, password })
    }
}

impl Authenticator for EnvAuthenticator {
    fn requires_authentication(&self, task: &str, url: &str) -> bool {
        !is_demo_site(url) && task_requires_authentication(task)
    }

    fn credentials(&self, url: &str, task: &str) -> Option<Credentials> {
        resolve_credentials(
            url,
            (self.email.as_deref(), self.password.as_deref()),
            |key| std::env::var(key).ok(),
        )
        .or_else(|| self.interactive.then(|| self.prompt_credentials(url, task)).flatten())
    }

    fn attempt_login(&self, driver: &mut dyn BrowserDriver, creds: &Credentials, timings: &Timings) -> bool {
        heuristic_login(driver, creds, timings)
    }

    fn prompt(&self, field: PromptField) -> Option<String> {
        if !self.interactive {
            return None;
        }
        let value = match field {
            PromptField::Email => {
                eprint!("Email/Username: ");
                let _ = std::io::stderr().flush();
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line).ok()?;
                line
            }
            PromptField::Password => rpassword::prompt_password("Password: ").ok()?,
        };
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

fn signed_in(driver: &mut dyn BrowserDriver) -> bool {
    !is_login_like(driver) && driver.count(SIGNED_IN_MARKERS) > 0
}

/// Reach a login form, fill whichever credential fields are showing, submit,
/// and repeat for split email/password pages.
pub fn heuristic_login(driver: &mut dyn BrowserDriver, creds: &Credentials, timings: &Timings) -> bool {
    if !is_login_like(driver) && driver.count(PASSWORD_FIELD) == 0 {
        let link = Locator::Css(SIGN_IN_LINKS.to_string());
        if driver.is_visible(&link) {
            debug!("Navigating to login page via sign-in link");
            if let Err(e) = driver.click(&link, false) {
                debug!("sign-in link click failed: {}", e);
            }
            std::thread::sleep(timings.login_settle);
        }
    }

    for pass in 1..=LOGIN_PASSES {
        if pass > 1 && signed_in(driver) {
            info!("✓ Login completed after {} pass(es)", pass - 1);
            return true;
        }

        let mut typed = false;
        if driver.count(IDENTITY_FIELD) > 0 {
            typed |= resolve::robust_fill(driver, IDENTITY_FIELD, &creds.email).is_ok();
        }
        if driver.count(PASSWORD_FIELD) > 0 {
            typed |= resolve::robust_fill(driver, PASSWORD_FIELD, &creds.password).is_ok();
        }
        if !typed {
            debug!(pass, "no credential fields visible");
            break;
        }

        let submit = Locator::Css(LOGIN_SUBMIT.to_string());
        if driver.click(&submit, false).is_err() && driver.press("Enter").is_err() {
            break;
        }
        std::thread::sleep(timings.login_settle);
    }

    let ok = signed_in(driver);
    if !ok {
        warn!("{}", EngineError::AuthenticationFailed("no signed-in markers after login".into()));
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_task_requires_authentication() {
        assert!(task_requires_authentication("Create a repository"));
        assert!(task_requires_authentication("publish the draft"));
        assert!(!task_requires_authentication("search for playwright in npm"));
    }

    #[test]
    fn test_login_urls() {
        let urls = login_urls("https://github.com/features");
        assert_eq!(urls.len(), 8);
        assert_eq!(urls[0], "https://github.com/login");
        assert_eq!(urls[7], "https://github.com/session/new");
        assert!(login_urls("not a url").is_empty());
    }

    #[test]
    fn test_overrides_win() {
        let creds = resolve_credentials(
            "https://github.com",
            (Some("me@x.test"), Some("pw")),
            env(&[("GITHUB_COM_EMAIL", "env@x.test"), ("GITHUB_COM_PASSWORD", "envpw")]),
        )
        .unwrap();
        assert_eq!(creds.email, "me@x.test");
    }

    #[test]
    fn test_domain_then_brand_env() {
        let creds = resolve_credentials(
            "https://github.com/new",
            (None, None),
            env(&[("GITHUB_COM_EMAIL", "a@x.test"), ("GITHUB_COM_PASSWORD", "a")]),
        )
        .unwrap();
        assert_eq!(creds.email, "a@x.test");

        let creds = resolve_credentials(
            "https://app.linear.app",
            (None, None),
            env(&[("APP_EMAIL", "b@x.test"), ("APP_PASSWORD", "b")]),
        )
        .unwrap();
        assert_eq!(creds.password, "b");

        // half a pair from each source still combines
        let creds = resolve_credentials(
            "https://github.com",
            (None, None),
            env(&[("GITHUB_COM_EMAIL", "c@x.test"), ("GITHUB_PASSWORD", "c")]),
        )
        .unwrap();
        assert_eq!((creds.email.as_str(), creds.password.as_str()), ("c@x.test", "c"));
    }

    #[test]
    fn test_brand_ignores_www() {
        assert_eq!(brand("www.github.com"), "github");
        assert_eq!(brand("app.linear.app"), "app");
        let creds = resolve_credentials(
            "https://www.github.com/new",
            (None, None),
            env(&[("GITHUB_EMAIL", "w@x.test"), ("GITHUB_PASSWORD", "w")]),
        )
        .unwrap();
        assert_eq!(creds.email, "w@x.test");
    }

    #[test]
    fn test_credentials_json_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"notion": {"email": "n@x.test", "password": "np"}, "github.com": {"email": "", "password": "x"}}"#,
        )
        .unwrap();
        let lookup = env(&[("CREDENTIALS_JSON", path.to_str().unwrap())]);
        let creds = resolve_credentials("https://notion.so", (None, None), &lookup).unwrap();
        assert_eq!(creds.email, "n@x.test");
        assert!(resolve_credentials("https://github.com", (None, None), &lookup).is_none());
    }

    #[test]
    fn test_non_interactive_prompt_is_none() {
        let auth = EnvAuthenticator::default();
        assert_eq!(auth.prompt(PromptField::Password), None);
        assert!(!auth.requires_authentication("create project", "https://demo.playwright.dev/todomvc"));
        assert!(auth.requires_authentication("create project", "https://linear.app"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials { email: "a@x.test".into(), password: "hunter2".into() };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
