//! State-change detection between two page snapshots.

/// Substrings whose appearance means a new UI layer (modal, dialog, form) emerged.
pub const LAYER_MARKERS: &[&str] = &[
    "<dialog",
    "role=\"dialog\"",
    "class=\"modal",
    "<form",
    "aria-modal=\"true\"",
];

pub const VALIDATION_MARKERS: &[&str] = &["aria-invalid=\"true\""];

/// Results listings re-render on every interaction; their DOM diffs are noise.
pub fn is_search_results_url(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("search") || url.contains("query") || url.contains("?q=")
}

fn emerged(prev: &str, cur: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| cur.contains(m) && !prev.contains(m))
}

/// True when a layer or validation marker is present now and was absent before.
/// Always false on search-results pages.
pub fn dom_layer_emerged(prev_dom: &str, cur_dom: &str, cur_url: &str) -> bool {
    if is_search_results_url(cur_url) {
        return false;
    }
    emerged(prev_dom, cur_dom, LAYER_MARKERS) || emerged(prev_dom, cur_dom, VALIDATION_MARKERS)
}

/// An unknown (empty) previous URL never counts as a change.
pub fn url_changed(prev_url: &str, cur_url: &str) -> bool {
    !prev_url.is_empty() && prev_url != cur_url
}

/// URL change, or a layer/validation marker that was not there before.
pub fn state_changed(prev_dom: &str, cur_dom: &str, prev_url: &str, cur_url: &str) -> bool {
    url_changed(prev_url, cur_url) || dom_layer_emerged(prev_dom, cur_dom, cur_url)
}
