//! Static checks over the template tokens of a `.docx` document.
//!
//! Validation never renders. Every problem becomes an [`Issue`] and the scan
//! carries on, so one call reports everything it can find.

mod references;
mod report;
mod schema;
mod semantic;
mod syntax;

pub use references::{Reference, ReferenceKind, References};
pub use report::{
    Issue, IssueCode, Location, Metadata, Severity, Summary, TokenRef, ValidationResult,
};
pub use schema::{FieldDef, FunctionDef, Schema, TypeInfo, TypeKind, normalize_path};

use crate::docx::Package;
use crate::error::DocxlateResult;
use crate::scanner::{TokenSpan, scan_document};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyntaxOptions {
    /// Return at most this many issues. `None` returns all of them.
    pub max_issues: Option<usize>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SemanticOptions {
    /// Report schema findings as errors instead of warnings.
    pub strict: bool,
    /// Return warnings, and let them make the document invalid.
    pub include_warnings: bool,
    pub max_issues: Option<usize>,
}

fn scan(bytes: &[u8]) -> DocxlateResult<Vec<TokenSpan>> {
    scan_document(&Package::from_bytes(bytes)?)
}

/// Checks that every token parses and that control blocks balance.
///
/// # Errors
/// - If `bytes` is not a readable `.docx` package. Problems with the
///   template itself are reported as issues, not errors.
///
/// # Example
///
/// ```no_run
/// use docxlate::{SyntaxOptions, validate_syntax};
///
/// let bytes = std::fs::read("letter.docx").unwrap();
/// let result = validate_syntax(&bytes, SyntaxOptions::default()).unwrap();
/// for issue in &result.issues {
///     println!("{}: {}", issue.code, issue.message);
/// }
/// ```
pub fn validate_syntax(bytes: &[u8], options: SyntaxOptions) -> DocxlateResult<ValidationResult> {
    let spans = scan(bytes)?;
    let issues = syntax::check(&spans);
    let result = ValidationResult::build(
        issues,
        spans.len(),
        Metadata::for_document(bytes),
        true,
        options.max_issues,
    );
    tracing::debug!(
        valid = result.valid,
        errors = result.summary.error_count,
        "validated syntax"
    );
    Ok(result)
}

/// Runs the syntax checks plus schema checks of fields and function calls.
///
/// # Errors
/// - If `bytes` is not a readable `.docx` package.
pub fn validate_semantics(
    bytes: &[u8],
    schema: &Schema,
    options: SemanticOptions,
) -> DocxlateResult<ValidationResult> {
    let spans = scan(bytes)?;
    let mut issues = syntax::check(&spans);
    issues.extend(semantic::check(&spans, schema, options.strict));
    let result = ValidationResult::build(
        issues,
        spans.len(),
        Metadata::for_document(bytes),
        options.include_warnings,
        options.max_issues,
    );
    tracing::debug!(
        valid = result.valid,
        errors = result.summary.error_count,
        warnings = result.summary.warning_count,
        "validated semantics"
    );
    Ok(result)
}

/// Lists the control tags, data paths and functions a document uses.
///
/// # Errors
/// - If `bytes` is not a readable `.docx` package.
pub fn extract_references(bytes: &[u8]) -> DocxlateResult<References> {
    Ok(references::extract(&scan(bytes)?))
}
