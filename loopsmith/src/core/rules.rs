//! Fixed validation rules presented to the model before any tool may run.

/// Rules the model checks a prompt against during the validation phase.
pub const VALIDATION_RULES: &[&str] = &[
    "The request must be specific enough to act on with a single tool call.",
    "File paths must stay inside the project unless the user names an absolute path.",
    "Never delete or overwrite files that were not mentioned in the request.",
    "Git operations must target an existing repository folder.",
    "Do not push to a remote unless the request asks for it.",
    "Report any rule the request violates before suggesting an action.",
];

/// Render the rule set as the validation system message body.
pub fn render_rules(rules: &[&str]) -> String {
    let list = serde_json::to_string(rules).unwrap_or_else(|_| "[]".to_string());
    format!("VALIDATION RULES:\n{list}")
}
