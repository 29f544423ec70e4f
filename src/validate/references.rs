use std::cmp::Ordering;
use std::fmt;

use crate::ast::Expr;
use crate::markup::MarkupKind;
use crate::parser::{parse_expression_strict, parse_for_header};
use crate::scanner::TokenSpan;

use super::report::Location;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A data path such as `customer.name`.
    Variable,
    /// A control tag: `if`, `for`, `end`, `include` and so on.
    Control,
    /// A called function, by name.
    Function,
}

impl ReferenceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Control => "control",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// The whole token the reference was found in, delimiters included.
    pub raw: String,
    pub kind: ReferenceKind,
    /// The path, function name or control tag text.
    pub expression: String,
    pub token_ordinal: usize,
    pub location: Location,
}

impl Reference {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.token_ordinal
            .cmp(&other.token_ordinal)
            .then_with(|| self.location.part.cmp(&other.location.part))
            .then(
                self.location
                    .char_start_utf16
                    .cmp(&other.location.char_start_utf16),
            )
            .then(self.kind.as_str().cmp(other.kind.as_str()))
            .then_with(|| self.expression.cmp(&other.expression))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct References {
    pub references: Vec<Reference>,
}

fn add(found: &mut Vec<(ReferenceKind, String)>, kind: ReferenceKind, expression: String) {
    if !found.iter().any(|(k, e)| *k == kind && *e == expression) {
        found.push((kind, expression));
    }
}

/// Collects `(kind, expression)` pairs used by an expression, in first-use
/// order.
fn collect(expr: &Expr, found: &mut Vec<(ReferenceKind, String)>) {
    if let Some(path) = expr.reference_path() {
        add(found, ReferenceKind::Variable, path.to_string());
        collect_indexes(expr, found);
        return;
    }
    match expr {
        Expr::Literal { .. } | Expr::Variable { .. } => {}
        Expr::FieldAccess { object, .. } => collect(object, found),
        Expr::IndexAccess { object, index } => {
            collect(object, found);
            collect(index, found);
        }
        Expr::UnaryOp { operand, .. } => collect(operand, found),
        Expr::BinaryOp { left, right, .. } => {
            collect(left, found);
            collect(right, found);
        }
        Expr::FunctionCall { name, args } => {
            add(found, ReferenceKind::Function, name.clone());
            for arg in args {
                collect(arg, found);
            }
        }
    }
}

fn collect_indexes(expr: &Expr, found: &mut Vec<(ReferenceKind, String)>) {
    match expr {
        Expr::FieldAccess { object, .. } => collect_indexes(object, found),
        Expr::IndexAccess { object, index } => {
            collect_indexes(object, found);
            collect(index, found);
        }
        Expr::Literal { .. }
        | Expr::Variable { .. }
        | Expr::UnaryOp { .. }
        | Expr::BinaryOp { .. }
        | Expr::FunctionCall { .. } => {}
    }
}

/// Lists every control tag, data path and function call in `spans`.
///
/// Each occurrence is reported with its location; expressions that do not
/// parse contribute only their control tag.
pub(crate) fn extract(spans: &[TokenSpan]) -> References {
    let mut references = Vec::new();

    for span in spans {
        let Some(token) = span.token.as_ref().filter(|_| !span.malformed) else {
            continue;
        };
        let mut found = Vec::new();

        if token.kind.is_control() {
            found.push((ReferenceKind::Control, span.inner_expression.clone()));
        }
        match token.kind {
            MarkupKind::For => {
                if let Ok(header) = parse_for_header(&token.value) {
                    collect(&header.collection, &mut found);
                }
            }
            MarkupKind::Variable
            | MarkupKind::Include
            | MarkupKind::If
            | MarkupKind::Elsif
            | MarkupKind::Unless => {
                if let Ok(expr) = parse_expression_strict(&token.value) {
                    collect(&expr, &mut found);
                }
            }
            MarkupKind::Else | MarkupKind::End | MarkupKind::PageBreak | MarkupKind::Text => {}
        }

        references.extend(found.into_iter().map(|(kind, expression)| Reference {
            raw: span.raw.clone(),
            kind,
            expression,
            token_ordinal: span.token_ordinal,
            location: Location::of(span),
        }));
    }

    references.sort_by(Reference::cmp_key);
    References { references }
}
