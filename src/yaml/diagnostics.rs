//! Diagnostics for plan files that fail to parse

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// A stored plan that is not valid YAML, or does not match the plan layout
#[derive(Debug, Error, Diagnostic)]
#[error("cannot read plan file: {message}")]
#[diagnostic(code(haccp::yaml::syntax))]
pub struct PlanSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl PlanSyntaxError {
    /// Build from a serde_yml error, pointing at the reported location
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let offset = line_col_to_offset(source, line, column);
        let message = err.to_string();
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convert a 1-based line/column to a byte offset, clamped to the source
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut line_start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let within = text
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            return line_start + within;
        }
        line_start += text.len();
    }
    source.len().saturating_sub(1)
}

fn generate_help(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("tab") {
        return Some("YAML indentation must use spaces, not tabs".to_string());
    }
    if msg.contains("duplicate") {
        return Some("each key may appear only once in a record".to_string());
    }
    if msg.contains("unknown variant") {
        return Some(
            "enumerations are closed sets; check the spelling of type, status, risk_level or cadence"
                .to_string(),
        );
    }
    if msg.contains("missing field") {
        return Some("the record is incomplete; restore the field or re-create it with the CLI".to_string());
    }
    if msg.contains("mapping values are not allowed") {
        return Some("a space may be missing after ':' or the indentation is off".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 3), 14);
    }

    #[test]
    fn test_help_generation() {
        assert!(generate_help("unknown variant `viral`").is_some());
        assert!(generate_help("missing field `severity`").is_some());
        assert!(generate_help("something else").is_none());
    }

    #[test]
    fn test_from_serde_error_keeps_message() {
        let source = "product:\n  code: [unclosed\n";
        let err = serde_yml::from_str::<serde_yml::Value>(source).unwrap_err();
        let diag = PlanSyntaxError::from_serde_error(&err, source, "plans/broken.haccp.yaml");
        assert!(!diag.message().is_empty());
    }
}
