use std::cmp::Ordering;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::scanner::TokenSpan;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IssueCode {
    /// A `{{` that is never closed.
    SyntaxError,
    /// An expression or `for` header that does not parse.
    UnsupportedExpression,
    /// `elsif` or `else` with no open block it can belong to.
    ControlBlockMismatch,
    ElsifAfterElse,
    DuplicateElse,
    UnmatchedEnd,
    MissingEnd,
    UnknownField,
    UnknownFunction,
    FunctionArgumentError,
    TypeMismatch,
}

impl IssueCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::UnsupportedExpression => "UNSUPPORTED_EXPRESSION",
            Self::ControlBlockMismatch => "CONTROL_BLOCK_MISMATCH",
            Self::ElsifAfterElse => "ELSIF_AFTER_ELSE",
            Self::DuplicateElse => "DUPLICATE_ELSE",
            Self::UnmatchedEnd => "UNMATCHED_END",
            Self::MissingEnd => "MISSING_END",
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::UnknownFunction => "UNKNOWN_FUNCTION",
            Self::FunctionArgumentError => "FUNCTION_ARGUMENT_ERROR",
            Self::TypeMismatch => "TYPE_MISMATCH",
        }
    }

    /// Codes reported when `if`/`unless`/`for` blocks do not nest properly.
    pub const fn is_control_block_issue(self) -> bool {
        matches!(
            self,
            Self::ControlBlockMismatch
                | Self::ElsifAfterElse
                | Self::DuplicateElse
                | Self::UnmatchedEnd
                | Self::MissingEnd
        )
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the token an issue is about.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenRef {
    pub raw: String,
    pub inner_expression: String,
    pub token_ordinal: usize,
    pub anchor_id: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub part: String,
    pub paragraph_index: usize,
    pub run_index: usize,
    pub char_start_utf16: usize,
    pub char_end_utf16: usize,
}

impl Location {
    pub(crate) fn of(span: &TokenSpan) -> Self {
        Self {
            part: span.part.clone(),
            paragraph_index: span.paragraph_index,
            run_index: span.run_index,
            char_start_utf16: span.char_start_utf16,
            char_end_utf16: span.char_end_utf16,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub token: TokenRef,
    pub location: Location,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub suggestions: Vec<String>,
}

impl Issue {
    pub(crate) fn at<M: Into<String>>(
        span: &TokenSpan,
        severity: Severity,
        code: IssueCode,
        message: M,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            token: TokenRef {
                raw: span.raw.clone(),
                inner_expression: span.inner_expression.clone(),
                token_ordinal: span.token_ordinal,
                anchor_id: span.anchor_id.clone(),
            },
            location: Location::of(span),
            suggestions: Vec::new(),
        }
    }

    pub(crate) fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Orders by part, token ordinal, start offset, code and severity.
    pub fn sort_key_cmp(&self, other: &Self) -> Ordering {
        self.location
            .part
            .cmp(&other.location.part)
            .then(self.token.token_ordinal.cmp(&other.token.token_ordinal))
            .then(
                self.location
                    .char_start_utf16
                    .cmp(&other.location.char_start_utf16),
            )
            .then(self.code.as_str().cmp(other.code.as_str()))
            .then(self.severity.cmp(&other.severity))
            .then(self.message.cmp(&other.message))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub checked_tokens: usize,
    /// Errors found, before truncation.
    pub error_count: usize,
    /// Warnings found, before filtering and truncation.
    pub warning_count: usize,
    pub returned_issue_count: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// `sha256:` followed by the hex digest of the validated bytes.
    pub document_hash: String,
    pub parser_version: String,
}

impl Metadata {
    pub(crate) fn for_document(bytes: &[u8]) -> Self {
        Self {
            document_hash: format!("sha256:{:x}", Sha256::digest(bytes)),
            parser_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<Issue>,
    pub summary: Summary,
    pub issues_truncated: bool,
    pub metadata: Metadata,
}

impl ValidationResult {
    /// Counts, filters, sorts and truncates `issues` into a result.
    ///
    /// Warnings are dropped unless `include_warnings` is set, and only then
    /// count against validity. Truncation happens last.
    pub(crate) fn build(
        mut issues: Vec<Issue>,
        checked_tokens: usize,
        metadata: Metadata,
        include_warnings: bool,
        max_issues: Option<usize>,
    ) -> Self {
        let error_count = issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .count();
        let warning_count = issues.len().saturating_sub(error_count);

        if !include_warnings {
            issues.retain(|issue| issue.severity == Severity::Error);
        }
        issues.sort_by(Issue::sort_key_cmp);

        let mut issues_truncated = false;
        if let Some(max_issues) = max_issues {
            if issues.len() > max_issues {
                issues.truncate(max_issues);
                issues_truncated = true;
            }
        }

        let valid = error_count == 0 && (!include_warnings || warning_count == 0);
        Self {
            valid,
            summary: Summary {
                checked_tokens,
                error_count,
                warning_count,
                returned_issue_count: issues.len(),
            },
            issues,
            issues_truncated,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::anchor_id;

    fn span(part: &str, ordinal: usize, start: usize) -> TokenSpan {
        TokenSpan {
            part: part.to_string(),
            paragraph_index: 0,
            run_index: 0,
            char_start_utf16: start,
            char_end_utf16: start + 5,
            raw: "{{x}}".to_string(),
            inner_expression: "x".to_string(),
            token_ordinal: ordinal,
            anchor_id: anchor_id(part, 0, start, start + 5, "{{x}}"),
            malformed: false,
            message: None,
            token: None,
        }
    }

    fn issue(part: &str, ordinal: usize, code: IssueCode, severity: Severity) -> Issue {
        Issue::at(&span(part, ordinal, ordinal * 10), severity, code, "test")
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_sort_order() {
        let issues = vec![
            issue("word/header1.xml", 0, IssueCode::UnknownField, Severity::Error),
            issue("word/document.xml", 2, IssueCode::UnknownField, Severity::Error),
            issue("word/document.xml", 1, IssueCode::UnknownFunction, Severity::Error),
            issue("word/document.xml", 1, IssueCode::TypeMismatch, Severity::Error),
        ];
        let result = ValidationResult::build(issues, 4, Metadata::for_document(b""), false, None);
        let order: Vec<(&str, usize, IssueCode)> = result
            .issues
            .iter()
            .map(|i| (i.location.part.as_str(), i.token.token_ordinal, i.code))
            .collect();
        assert_eq!(
            order,
            vec![
                ("word/document.xml", 1, IssueCode::TypeMismatch),
                ("word/document.xml", 1, IssueCode::UnknownFunction),
                ("word/document.xml", 2, IssueCode::UnknownField),
                ("word/header1.xml", 0, IssueCode::UnknownField),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_truncation_keeps_counts() {
        let issues = (0..4)
            .map(|i| issue("word/document.xml", i, IssueCode::UnknownField, Severity::Error))
            .collect();
        let result = ValidationResult::build(issues, 4, Metadata::for_document(b""), false, Some(2));
        assert!(result.issues_truncated);
        assert!(!result.valid);
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.summary.error_count, 4);
        assert_eq!(result.summary.returned_issue_count, 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_warnings_filtered_before_truncation() {
        let issues = vec![
            issue("word/document.xml", 0, IssueCode::UnknownField, Severity::Warning),
            issue("word/document.xml", 1, IssueCode::UnknownField, Severity::Warning),
            issue("word/document.xml", 2, IssueCode::MissingEnd, Severity::Error),
        ];
        let result = ValidationResult::build(
            issues.clone(),
            3,
            Metadata::for_document(b""),
            false,
            Some(1),
        );
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].code, IssueCode::MissingEnd);
        assert!(!result.issues_truncated);
        assert_eq!(result.summary.warning_count, 2);

        let warnings_only = issues[..2].to_vec();
        let result =
            ValidationResult::build(warnings_only.clone(), 2, Metadata::for_document(b""), false, None);
        assert!(result.valid);
        assert!(result.issues.is_empty());
        let result = ValidationResult::build(warnings_only, 2, Metadata::for_document(b""), true, None);
        assert!(!result.valid);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_document_hash() {
        let metadata = Metadata::for_document(b"abc");
        assert_eq!(
            metadata.document_hash,
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(metadata.parser_version, env!("CARGO_PKG_VERSION"));
    }
}
