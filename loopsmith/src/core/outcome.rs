//! Failure tagging for text results that flow back to the model and the CLI.

/// Prefix carried by every failure string.
pub const FAILURE_MARKER: &str = "❌ ";

/// Build a tagged failure string: `❌ <kind>: <detail>`.
pub fn failure(kind: &str, detail: impl AsRef<str>) -> String {
    format!("{FAILURE_MARKER}{kind}: {}", detail.as_ref())
}

/// True if `text` is a tagged failure.
pub fn is_failure(text: &str) -> bool {
    text.trim_start().starts_with(FAILURE_MARKER)
}
