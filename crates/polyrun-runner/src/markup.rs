//! Markup detection.
//!
//! Content that looks like an HTML document or fragment is rendered by the
//! client instead of being executed. Detection is label-independent: HTML
//! pasted under a "python" label is still rendered.

/// Number of leading characters scanned for markup indicators.
const SCAN_WINDOW: usize = 200;

/// Substrings that mark content as HTML when found near the start.
const MARKUP_INDICATORS: &[&str] = &[
    "<html", "<head", "<body", "<div", "<span", "<script", "<style", "<svg", "<meta", "<link",
    "<p>", "<h1", "<table", "<form", "<canvas", "<iframe",
];

/// Language labels that always render.
const MARKUP_LABELS: &[&str] = &[
    "html",
    "html5",
    "htm",
    "css",
    "jsp",
    "javascript (web)",
    "svg",
    "xml",
];

/// Check whether source text is passive markup.
pub fn is_markup(code: &str) -> bool {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with("<!doctype") || lower.starts_with("<html") {
        return true;
    }

    let window: String = lower.chars().take(SCAN_WINDOW).collect();
    MARKUP_INDICATORS
        .iter()
        .any(|indicator| window.contains(indicator))
}

/// Check whether a language label names a markup language.
pub fn is_markup_label(language: &str) -> bool {
    let label = language.trim().to_lowercase();
    MARKUP_LABELS.contains(&label.as_str())
}

/// Decide whether a request should be rendered rather than executed.
pub fn should_render(language: &str, code: &str) -> bool {
    is_markup_label(language) || is_markup(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctype_is_markup() {
        assert!(is_markup("<!DOCTYPE html>\n<html><body></body></html>"));
        assert!(is_markup("   <!doctype html>"));
    }

    #[test]
    fn test_html_tag_is_markup() {
        assert!(is_markup("<html lang=\"en\">"));
        assert!(is_markup("\n\n<HTML>"));
    }

    #[test]
    fn test_fragment_indicators() {
        assert!(is_markup("<div>hi</div>"));
        assert!(is_markup("<style>body { color: red; }</style>"));
        assert!(is_markup("<svg width=\"10\"></svg>"));
        assert!(is_markup("<meta charset=\"utf-8\">"));
    }

    #[test]
    fn test_empty_is_not_markup() {
        assert!(!is_markup(""));
        assert!(!is_markup("   \n\t"));
    }

    #[test]
    fn test_code_is_not_markup() {
        assert!(!is_markup("print(\"hi\")"));
        assert!(!is_markup("#include <stdio.h>\nint main(void) { return 0; }"));
        // Comparison operators are not tags.
        assert!(!is_markup("if a < b and b > c:\n    pass"));
    }

    #[test]
    fn test_indicator_outside_window_is_ignored() {
        let mut code = "x = 1\n".repeat(60);
        code.push_str("s = '<div>'");
        assert!(!is_markup(&code));
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let mut code = "é".repeat(150);
        code.push_str("<div>");
        assert!(is_markup(&code));
    }

    #[test]
    fn test_markup_overrides_label() {
        let code = "<!DOCTYPE html>\n<html><body><h1>Hello</h1></body></html>";
        assert!(should_render("python", code));
    }

    #[test]
    fn test_markup_labels() {
        assert!(is_markup_label("HTML5"));
        assert!(is_markup_label(" css "));
        assert!(is_markup_label("JavaScript (web)"));
        assert!(!is_markup_label("javascript"));
        assert!(should_render("html", "plain text"));
        assert!(!should_render("python", "print(1)"));
    }
}
