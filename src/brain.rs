use anyhow::anyhow;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Value, json};
use std::sync::LazyLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::types::{
    Action, DOM_SLICE_MAX_CHARS, ExecutionRecord, HISTORY_WINDOW, MAX_DYNAMIC_STEPS,
    MAX_PLAN_STEPS, Step,
};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_SELECTOR_CHARS: usize = 300;
const MAX_URL_CHARS: usize = 500;
const MAX_VALUE_CHARS: usize = 300;
const MAX_CLICKABLES: usize = 50;
const MAX_INPUT_HINTS: usize = 25;

const SYSTEM_PROMPT: &str = "You are a precise UI automation planner. You decompose tasks into \
complete, actionable step sequences, fulfilling ALL task verbs and requirements. You return only \
valid JSON arrays.";

const STEP_SCHEMA: &str = r#"Return ONLY a JSON array. Each item is an object with:
description (string), action (navigate|click|fill|wait|scroll|press),
selector (string for click/fill/wait; omit for navigate), url (only for navigate),
value (only for fill), key (only for press, e.g. "Enter")."#;

const PLAN_RULES: &str = r#"Rules:
1. Decompose the task into ALL its verbs. "search and open X" needs a search AND a click on X.
2. The browser is already on the target site. Do not plan a web search.
3. Use labels from the clickables/inputs context as selectors. Never use CSS class selectors.
4. If the page already shows a workspace (not a login), skip Sign in steps.
5. Search tasks: fill the search box, submit, wait 2 seconds, then click the top result by its visible text.
6. Create tasks: click the control naming the resource ("New repository"), fill its name/title field, click the final submit.
7. After any submit/create/save/download click add a wait step on "body" mentioning 3 seconds, then a scroll.
8. The last step must be a wait or a scroll so the final state is captured."#;

/// Produces steps for a task given the current page.
///
/// `history` is `None` for an initial plan and `Some` when the engine asks
/// for follow-up steps mid-run. Implementations never fail; any internal
/// problem yields an empty list.
pub trait Planner {
    fn plan(
        &self,
        task: &str,
        url: Option<&str>,
        html: Option<&str>,
        history: Option<&[ExecutionRecord]>,
    ) -> Vec<Step>;
}

/// Chat-completions planner.
///
/// Runs its HTTP calls on the tokio runtime it was created with, blocking the
/// calling thread. Must be used from a blocking context (`spawn_blocking`).
pub struct Brain {
    client: Client,
    api_key: String,
    model: String,
    handle: Handle,
}

impl Brain {
    pub fn new(api_key: String, model: Option<String>, handle: Handle) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            handle,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_env(model: Option<String>, handle: Handle) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(api_key, model, handle))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": prompt},
                ],
                "temperature": 0.0,
                "max_tokens": 1500,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(anyhow!("OpenAI API error ({}): {}", status, err_msg));
        }

        json_resp["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow!("No content in LLM response: {}", json_resp))
    }
}

impl Planner for Brain {
    fn plan(
        &self,
        task: &str,
        url: Option<&str>,
        html: Option<&str>,
        history: Option<&[ExecutionRecord]>,
    ) -> Vec<Step> {
        let (prompt, limit) = match history {
            None => (initial_prompt(task, url, html), MAX_PLAN_STEPS),
            Some(history) => (followup_prompt(task, url, html, history), MAX_DYNAMIC_STEPS),
        };

        let content = match self.handle.block_on(self.complete(&prompt)) {
            Ok(content) => content,
            Err(e) => {
                warn!("{}", EngineError::PlannerUnavailable(format!("{e:#}")));
                return Vec::new();
            }
        };
        debug!("LLM says: {}", content);

        let mut steps = validate_steps(extract_json_array(&content));
        steps.truncate(limit);
        info!("Planner returned {} step(s)", steps.len());
        steps
    }
}

/// Clickable labels and input hints pulled from a snapshot for the prompt.
#[derive(Debug, Default, serde::Serialize)]
pub struct PageContext {
    pub clickables: Vec<String>,
    pub inputs: Vec<String>,
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn clean(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").chars().take(80).collect()
}

pub fn page_context(html: Option<&str>) -> PageContext {
    let Some(html) = html.filter(|h| !h.trim().is_empty()) else {
        return PageContext::default();
    };
    let doc = Html::parse_document(html);
    let mut ctx = PageContext::default();

    if let Ok(sel) = Selector::parse("button, a, [role='button'], [role='link'], [type='submit'], summary") {
        for el in doc.select(&sel) {
            let attr = |name: &str| clean(el.value().attr(name).unwrap_or(""));
            let text = clean(&el.text().collect::<Vec<_>>().join(" "));
            let label = [text, attr("aria-label"), attr("title")]
                .into_iter()
                .find(|s| !s.is_empty());
            let Some(label) = label else { continue };

            let lower = label.to_lowercase();
            if ["learn more", "pricing", "careers", "blog", "news", "footer", "header", "about us", "contact us"]
                .iter()
                .any(|k| lower.contains(k))
            {
                continue;
            }
            if label.split_whitespace().count() <= 10 {
                ctx.clickables.push(label);
            }
            if ctx.clickables.len() >= MAX_CLICKABLES {
                break;
            }
        }
    }

    if let Ok(sel) = Selector::parse("input, textarea") {
        for el in doc.select(&sel) {
            let attr = |name: &str| clean(el.value().attr(name).unwrap_or(""));
            let (placeholder, aria, name, id, kind) =
                (attr("placeholder"), attr("aria-label"), attr("name"), attr("id"), attr("type"));

            let mut parts = Vec::new();
            if !placeholder.is_empty() {
                parts.push(placeholder.clone());
            }
            if !aria.is_empty() && aria != placeholder {
                parts.push(format!("[{aria}]"));
            }
            if !id.is_empty() {
                parts.push(format!("#{id}"));
            }
            if !name.is_empty() && name != id {
                parts.push(format!("name={name}"));
            }
            if !kind.is_empty() {
                parts.push(format!("({kind})"));
            }
            if parts.is_empty() {
                continue;
            }
            let hint = parts.join(" ");
            let lower = hint.to_lowercase();
            if ["newsletter", "subscribe", "marketing", "cookie", "consent", "footer", "header", "nav"]
                .iter()
                .any(|k| lower.contains(k))
            {
                continue;
            }
            ctx.inputs.push(hint);
            if ctx.inputs.len() >= MAX_INPUT_HINTS {
                break;
            }
        }
    }

    ctx
}

fn initial_prompt(task: &str, url: Option<&str>, html: Option<&str>) -> String {
    let url = url.unwrap_or("unknown");
    let ctx = page_context(html);
    let context = json!({
        "task": task,
        "url": url,
        "clickables": ctx.clickables,
        "inputs": ctx.inputs,
    });
    format!(
        "You are an expert UI automation planner.\n\
         The browser is ALREADY on {url}. Generate a COMPLETE step sequence for the task on this site.\n\n\
         Context (JSON):\n{context:#}\n\n{STEP_SCHEMA}\n{PLAN_RULES}\n\n\
         Return only the JSON array."
    )
}

/// Whitespace-collapsed prefix of a snapshot.
pub fn dom_slice(html: &str) -> String {
    WHITESPACE.replace_all(html, " ").chars().take(DOM_SLICE_MAX_CHARS).collect()
}

fn followup_prompt(task: &str, url: Option<&str>, html: Option<&str>, history: &[ExecutionRecord]) -> String {
    let recent: Vec<Value> = history
        .iter()
        .skip(history.len().saturating_sub(HISTORY_WINDOW))
        .map(|r| {
            json!({
                "step": r.step,
                "action": r.action,
                "description": r.description,
                "status": r.status,
                "url": r.url,
            })
        })
        .collect();
    let recent = Value::Array(recent);
    let slice = html.map(dom_slice).unwrap_or_default();

    format!(
        "You are continuing an in-progress UI automation plan. Given new UI state \
         (possibly a modal/form/success layer) produce the NEXT focused steps only.\n\n\
         Task: {task}\nCurrent URL: {url}\nRecent Steps JSON: {recent}\n\nDOM Slice: {slice}\n\n\
         {STEP_SCHEMA}\nSkip any redundant login/auth. Prefer newly visible modal/form fields or \
         closing success banners. Limit to {MAX_DYNAMIC_STEPS} steps.",
        url = url.unwrap_or("unknown"),
    )
}

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?").expect("valid fence regex"));
static ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));

/// Best-effort JSON array extraction from model output.
pub fn extract_json_array(text: &str) -> Vec<Value> {
    let cleaned = FENCE.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.starts_with('[')
        && let Ok(Value::Array(items)) = serde_json::from_str(cleaned)
    {
        return items;
    }
    ARRAY
        .find(cleaned)
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
}

fn field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
    .filter(|s| !s.is_empty())
}

fn clip(value: Option<String>, max: usize) -> Option<String> {
    value.map(|v| v.chars().take(max).collect())
}

/// Keep well-formed steps with known actions, clipping long fields; at most twenty.
pub fn validate_steps(raw: Vec<Value>) -> Vec<Step> {
    raw.into_iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let action_name = field(obj, "action")?.to_lowercase();
            let action: Action = serde_json::from_value(Value::String(action_name)).ok()?;
            if action == Action::Unknown {
                return None;
            }
            let step = Step {
                description: field(obj, "description").unwrap_or_default(),
                action,
                selector: clip(field(obj, "selector"), MAX_SELECTOR_CHARS),
                url: clip(field(obj, "url"), MAX_URL_CHARS),
                value: clip(field(obj, "value"), MAX_VALUE_CHARS),
                key: field(obj, "key"),
            };
            step.is_well_formed().then_some(step)
        })
        .take(MAX_PLAN_STEPS)
        .collect()
}

/// Planner used when no LLM is configured: never proposes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl Planner for Offline {
    fn plan(&self, _: &str, _: Option<&str>, _: Option<&str>, _: Option<&[ExecutionRecord]>) -> Vec<Step> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepStatus;

    #[test]
    fn test_extract_json_array_from_fenced_output() {
        let text = "```json\n[{\"action\":\"scroll\"}]\n```";
        assert_eq!(extract_json_array(text).len(), 1);

        let text = "Sure! Here is the plan:\n[{\"action\":\"wait\",\"selector\":\"body\"}]\nGood luck.";
        assert_eq!(extract_json_array(text).len(), 1);

        assert!(extract_json_array("no json here").is_empty());
        assert!(extract_json_array("{\"action\":\"click\"}").is_empty());
    }

    #[test]
    fn test_validate_drops_malformed_steps() {
        let raw = extract_json_array(
            r##"[
                {"description":"go","action":"navigate"},
                {"description":"go","action":"Navigate","url":"https://a.test"},
                {"description":"hover","action":"hover","selector":"a"},
                {"description":"press","action":"press"},
                {"description":"click","action":"click"},
                {"description":"fill","action":"fill","selector":"#q","value":42},
                "not an object",
                {"description":"scroll","action":"scroll"}
            ]"##,
        );
        let steps = validate_steps(raw);
        let actions: Vec<Action> = steps.iter().map(|s| s.action).collect();
        assert_eq!(actions, vec![Action::Navigate, Action::Fill, Action::Scroll]);
        assert_eq!(steps[1].value.as_deref(), Some("42"));
    }

    #[test]
    fn test_validate_truncates_fields_and_count() {
        let long = "x".repeat(1000);
        let raw: Vec<Value> = (0..30)
            .map(|_| json!({"action": "click", "selector": long, "description": "c"}))
            .collect();
        let steps = validate_steps(raw);
        assert_eq!(steps.len(), MAX_PLAN_STEPS);
        assert_eq!(steps[0].selector_str().len(), MAX_SELECTOR_CHARS);

        let steps = validate_steps(vec![json!({"action": "navigate", "url": long})]);
        assert_eq!(steps[0].url.as_ref().unwrap().len(), MAX_URL_CHARS);
    }

    #[test]
    fn test_page_context_filters_noise() {
        let html = r#"<body>
            <a href="/pricing">Pricing</a>
            <button aria-label="Create project"></button>
            <a>Learn more about us</a>
            <input id="repository_name" name="repository[name]" placeholder="my-repo">
            <input name="newsletter_email" placeholder="Subscribe">
        </body>"#;
        let ctx = page_context(Some(html));
        assert_eq!(ctx.clickables, vec!["Create project".to_string()]);
        assert_eq!(ctx.inputs, vec!["my-repo #repository_name name=repository[name]".to_string()]);
        assert!(page_context(None).clickables.is_empty());
    }

    #[test]
    fn test_followup_prompt_windows_history() {
        let history: Vec<ExecutionRecord> = (1..=20)
            .map(|i| ExecutionRecord {
                step: i,
                description: format!("step-{i}"),
                action: Action::Click,
                selector: String::new(),
                status: StepStatus::Ok,
                screenshot: "skipped".into(),
                url: None,
            })
            .collect();
        let html = format!("<div>{}</div>", "a   b ".repeat(2000));
        let prompt = followup_prompt("t", Some("https://a.test"), Some(&html), &history);
        assert!(!prompt.contains("\"step-8\""));
        assert!(prompt.contains("\"step-9\""));
        assert!(prompt.contains("\"step-20\""));
        assert_eq!(dom_slice(&html).chars().count(), DOM_SLICE_MAX_CHARS);
        assert!(!dom_slice("a \n\n  b").contains("  "));
    }

    #[test]
    fn test_offline_planner_is_empty() {
        assert!(Offline.plan("create project", None, Some("<p></p>"), None).is_empty());
    }
}
