//! JavaScript evaluated inside the page.
//!
//! Element lookups run in the browser so that Playwright-style selector
//! shapes planners like to emit (`button:has-text('Create')`, `text=Save`)
//! resolve the same way as plain CSS. A resolved element is tagged with a
//! `data-stepshot` attribute and addressed by that attribute afterwards.

use serde_json::json;

use crate::hands::Locator;

/// Lookup helper shared by every script. Its only side effect is the marker attribute.
const LOCATE_JS: &str = r#"
(loc, mode) => {
  function isVisible(el) {
    if (el.offsetParent === null && el.tagName !== 'BODY' && el.tagName !== 'HTML') {
      const pos = getComputedStyle(el).position;
      if (pos !== 'fixed' && pos !== 'sticky') return false;
    }
    const s = getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
  }

  function textOf(el) {
    return ((el.innerText || el.textContent || el.value || '') + '').trim().replace(/\s+/g, ' ').toLowerCase();
  }

  function splitTop(sel) {
    const parts = [];
    let depth = 0, quote = null, cur = '';
    for (const ch of sel) {
      if (quote) { if (ch === quote) quote = null; cur += ch; continue; }
      if (ch === '"' || ch === "'") { quote = ch; cur += ch; continue; }
      if (ch === '(' || ch === '[') depth++;
      if (ch === ')' || ch === ']') depth--;
      if (ch === ',' && depth === 0) { parts.push(cur); cur = ''; continue; }
      cur += ch;
    }
    parts.push(cur);
    return parts.map(p => p.trim()).filter(Boolean);
  }

  function query(sel) {
    try { return [...document.querySelectorAll(sel)]; } catch (e) { return []; }
  }

  const TEXTUAL = 'a, button, [role="button"], [role="link"], [role="tab"], [role="menuitem"], ' +
    'input[type="submit"], input[type="button"], summary, label, li, span, div, p, h1, h2, h3, h4';

  function byText(needle) {
    needle = needle.trim().toLowerCase();
    if (!needle) return [];
    const all = query(TEXTUAL);
    const exact = all.filter(el => textOf(el) === needle);
    const partial = all
      .filter(el => !exact.includes(el) && textOf(el).includes(needle))
      .sort((a, b) => textOf(a).length - textOf(b).length);
    return exact.concat(partial);
  }

  function byCss(sel) {
    const out = [];
    for (const part of splitTop(sel)) {
      if (part.toLowerCase().startsWith('text=')) { out.push(...byText(part.slice(5))); continue; }
      const m = part.match(/^(.*?):has-text\((['"])(.*?)\2\)(.*)$/);
      if (m) {
        const needle = m[3].trim().toLowerCase();
        const base = (m[1] || '*') + m[4];
        out.push(...query(base).filter(el => textOf(el).includes(needle)));
      } else {
        out.push(...query(part));
      }
    }
    return out;
  }

  function byRole(role, name) {
    const sel = role === 'link'
      ? 'a, [role="link"]'
      : 'button, [role="button"], input[type="submit"], input[type="button"]';
    name = (name || '').toLowerCase();
    return query(sel).filter(el =>
      textOf(el).includes(name) || (el.getAttribute('aria-label') || '').toLowerCase().includes(name));
  }

  function byLabel(needle) {
    needle = needle.toLowerCase();
    const out = [];
    for (const label of query('label')) {
      if (!textOf(label).includes(needle)) continue;
      const target = label.htmlFor ? document.getElementById(label.htmlFor)
        : label.querySelector('input, textarea, select');
      if (target) out.push(target);
    }
    out.push(...query('input[aria-label], textarea[aria-label]')
      .filter(el => el.getAttribute('aria-label').toLowerCase().includes(needle)));
    return out;
  }

  function byPlaceholder(needle) {
    needle = needle.toLowerCase();
    return query('input[placeholder], textarea[placeholder]')
      .filter(el => el.getAttribute('placeholder').toLowerCase().includes(needle));
  }

  let found;
  switch (loc.kind) {
    case 'css': found = byCss(loc.value); break;
    case 'text': found = byText(loc.value); break;
    case 'role': found = byRole(loc.value.role, loc.value.name); break;
    case 'label': found = byLabel(loc.value); break;
    case 'placeholder': found = byPlaceholder(loc.value); break;
    default: found = [];
  }
  found = [...new Set(found)];
  const visible = found.filter(isVisible);

  if (mode === 'count') return visible.length;
  if (mode === 'visible') return visible.length > 0;

  const el = visible[0] || (mode === 'force' ? found[0] : null);
  if (!el) return '';
  try { el.scrollIntoView({ block: 'center' }); } catch (e) {}
  window.__stepshotSeq = (window.__stepshotSeq || 0) + 1;
  const mark = String(window.__stepshotSeq);
  el.setAttribute('data-stepshot', mark);
  return '[data-stepshot="' + mark + '"]';
}
"#;

/// What a locate script should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    /// Number of visible matches.
    Count,
    /// Whether any match is visible.
    Visible,
    /// Marker selector for the first visible match, or `""`.
    Mark,
    /// Like `Mark`, but falls back to the first match even if hidden.
    Force,
}

impl LocateMode {
    fn as_str(&self) -> &'static str {
        match self {
            LocateMode::Count => "count",
            LocateMode::Visible => "visible",
            LocateMode::Mark => "mark",
            LocateMode::Force => "force",
        }
    }
}

pub fn locate_script(locator: &Locator, mode: LocateMode) -> String {
    let loc = serde_json::to_string(locator).unwrap_or_else(|_| "{}".to_string());
    let mode = json!(mode.as_str());
    format!("({LOCATE_JS})({loc}, {mode})")
}

/// Dispatches a DOM click on a marked element, bypassing hit-testing.
pub fn force_click_script(marker: &str) -> String {
    let sel = json!(marker);
    format!("(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()")
}

/// Clears an input's value and notifies frameworks listening for input events.
pub fn clear_value_script(marker: &str) -> String {
    let sel = json!(marker);
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.focus(); el.value = ''; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()"
    )
}

/// Split a selector list on top-level commas, the same way `splitTop` does in
/// the page: commas inside quotes, parentheses or brackets stay put.
pub fn split_top(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in selector.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

pub fn scroll_script(dy: i64) -> String {
    format!("window.scrollBy(0, {dy})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_script_embeds_locator_as_json() {
        let script = locate_script(&Locator::Css("button:has-text('Go')".into()), LocateMode::Mark);
        assert!(script.contains(r#"{"kind":"css","value":"button:has-text('Go')"}"#));
        assert!(script.ends_with(r#", "mark")"#));

        let script = locate_script(
            &Locator::Role { role: "link".into(), name: "Docs".into() },
            LocateMode::Count,
        );
        assert!(script.contains(r#""kind":"role""#));
        assert!(script.contains(r#""name":"Docs""#));
    }

    #[test]
    fn test_split_top_keeps_quoted_and_nested_commas() {
        assert_eq!(
            split_top("button:has-text('Save, continue'), text=Done"),
            ["button:has-text('Save, continue')", "text=Done"]
        );
        assert_eq!(
            split_top(r#"input[name="a,b"], :is(h1, h2) ,"#),
            [r#"input[name="a,b"]"#, ":is(h1, h2)"]
        );
        assert!(split_top(" , ").is_empty());
    }

    #[test]
    fn test_marker_is_quoted_safely() {
        let script = force_click_script(r#"[data-stepshot="3"]"#);
        assert!(script.contains(r#"document.querySelector("[data-stepshot=\"3\"]")"#));
    }
}
