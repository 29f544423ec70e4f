use crate::markup::MarkupKind;
use crate::parser::{parse_expression_strict, parse_for_header};
use crate::scanner::TokenSpan;

use super::report::{Issue, IssueCode, Severity};

/// An open `if`, `unless` or `for` block.
struct Frame<'t> {
    kind: MarkupKind,
    opener: &'t TokenSpan,
    seen_else: bool,
}

fn error(span: &TokenSpan, code: IssueCode, message: impl Into<String>) -> Issue {
    Issue::at(span, Severity::Error, code, message)
}

/// Re-parses the expression part of a tag.
fn check_expression(span: &TokenSpan, kind: MarkupKind, value: &str) -> Option<Issue> {
    let parsed = if kind == MarkupKind::For {
        parse_for_header(value).map(|_| ())
    } else {
        parse_expression_strict(value).map(|_| ())
    };
    parsed.err().map(|err| {
        error(
            span,
            IssueCode::UnsupportedExpression,
            format!("Cannot parse '{}': {}", value, err),
        )
    })
}

/// Checks every span's expression and the nesting of control blocks.
///
/// Never stops early; one issue is reported per problem found.
pub(crate) fn check(spans: &[TokenSpan]) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();

    for span in spans {
        let Some(token) = span.token.as_ref().filter(|_| !span.malformed) else {
            let message = span
                .message
                .clone()
                .unwrap_or_else(|| "Malformed template token".to_string());
            issues.push(error(span, IssueCode::SyntaxError, message));
            continue;
        };

        match token.kind {
            MarkupKind::Variable | MarkupKind::Include => {
                issues.extend(check_expression(span, token.kind, &token.value));
            }
            MarkupKind::If | MarkupKind::Unless | MarkupKind::For => {
                issues.extend(check_expression(span, token.kind, &token.value));
                stack.push(Frame {
                    kind: token.kind,
                    opener: span,
                    seen_else: false,
                });
            }
            MarkupKind::Elsif => {
                issues.extend(check_expression(span, token.kind, &token.value));
                match stack.last() {
                    Some(frame) if frame.kind == MarkupKind::If && !frame.seen_else => {}
                    Some(frame) if frame.kind == MarkupKind::If => issues.push(error(
                        span,
                        IssueCode::ElsifAfterElse,
                        "'elsif' cannot follow 'else' in the same 'if' block",
                    )),
                    Some(_) | None => issues.push(error(
                        span,
                        IssueCode::ControlBlockMismatch,
                        "'elsif' is not inside an 'if' block",
                    )),
                }
            }
            MarkupKind::Else => {
                if !token.value.is_empty() {
                    issues.push(error(
                        span,
                        IssueCode::UnsupportedExpression,
                        format!("Unexpected '{}' after 'else'", token.value),
                    ));
                }
                match stack.last_mut() {
                    Some(frame)
                        if matches!(frame.kind, MarkupKind::If | MarkupKind::Unless)
                            && !frame.seen_else =>
                    {
                        frame.seen_else = true;
                    }
                    Some(frame) if matches!(frame.kind, MarkupKind::If | MarkupKind::Unless) => {
                        issues.push(error(
                            span,
                            IssueCode::DuplicateElse,
                            format!("'{}' block already has an 'else'", frame.kind.keyword()),
                        ));
                    }
                    Some(_) | None => issues.push(error(
                        span,
                        IssueCode::ControlBlockMismatch,
                        "'else' is not inside an 'if' or 'unless' block",
                    )),
                }
            }
            MarkupKind::End => {
                if !token.value.is_empty() {
                    issues.push(error(
                        span,
                        IssueCode::UnsupportedExpression,
                        format!("Unexpected '{}' after 'end'", token.value),
                    ));
                }
                if stack.pop().is_none() {
                    issues.push(error(
                        span,
                        IssueCode::UnmatchedEnd,
                        "'end' has no open block to close",
                    ));
                }
            }
            MarkupKind::PageBreak | MarkupKind::Text => {}
        }
    }

    for frame in stack {
        issues.push(error(
            frame.opener,
            IssueCode::MissingEnd,
            format!("'{}' block is never closed with 'end'", frame.kind.keyword()),
        ));
    }

    tracing::debug!(tokens = spans.len(), issues = issues.len(), "checked syntax");
    issues
}
