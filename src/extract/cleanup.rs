//! Fence stripping for model output.

use std::sync::LazyLock;

use regex::Regex;

static MARKDOWN_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```markdown[ \t]*\r?\n?").expect("valid regex"));
static MARKDOWN_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```\s*$").expect("valid regex"));
static XML_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:xml)?\s*").expect("valid regex"));
static ANY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("valid regex"));

/// Remove one leading ```` ```markdown ```` and one trailing ```` ``` ````.
///
/// Only the fence line itself is removed, so the page's own leading
/// whitespace survives. Interior fences (code samples inside the page) are
/// left alone.
pub fn clean_markdown_fence(text: &str) -> String {
    let opened = MARKDOWN_OPEN.replace(text, "");
    MARKDOWN_CLOSE.replace(&opened, "").into_owned()
}

/// Remove an optional ```` ```xml ```` / ```` ``` ```` wrapper around a structure reply
pub fn strip_xml_fence(text: &str) -> String {
    let opened = XML_OPEN.replace(text, "");
    ANY_CLOSE.replace(&opened, "").into_owned()
}

/// Wrap Markdown the way models usually return it
pub fn wrap_in_markdown_fence(text: &str) -> String {
    format!("```markdown\n{}\n```", text)
}
