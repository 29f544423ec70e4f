//! A template language for word-processor documents.
//!
//! Templates are ordinary `.docx` files whose text holds `{{...}}` tags:
//! substitutions such as `{{customer.name}}`, conditionals (`{{if}}`,
//! `{{elsif}}`, `{{else}}`, `{{unless}}`), loops (`{{for item in items}}`),
//! `{{include "fragment"}}` and `{{pageBreak}}`, each block closed by `{{end}}`.
//!
//! The crate has two halves. [`Template`] and [`Engine`] parse and render
//! template text against a [`Context`]. [`validate_syntax`],
//! [`validate_semantics`] and [`extract_references`] inspect a `.docx`
//! package without rendering it, locating every tag even when the word
//! processor has split it across formatting runs.

mod ast;
mod docx;
mod engine;
mod error;
mod eval;
mod interface;
mod lexer;
mod markup;
mod parser;
mod scanner;
mod template;
mod validate;

// Public exports.
pub use ast::{
    BinaryOp, Body, ElsifBranch, Expr, ForHeader, Node, PathSegment, ReferencePath, UnaryOp,
};
pub use docx::{DOCUMENT_PART, Package, Paragraph, Run, body_text, paragraphs, template_parts};
pub use engine::{Engine, EngineConfig};
pub use error::{
    DocxlateError, DocxlateResult, EvaluationError, LexError, LexErrorKind, ParseError,
    ParseErrorKind,
};
pub use eval::{Evaluator, evaluate, values_equal};
pub use interface::{
    Callable, Context, Fragment, FragmentStore, Fragments, FunctionRegistry, Functions,
    PartSource, Value,
};
pub use lexer::{Token, TokenKind, tokenize};
pub use markup::{CLOSE_DELIMITER, MarkupKind, MarkupToken, OPEN_DELIMITER, classify, tokenize_markup};
pub use parser::{parse_expression, parse_expression_strict, parse_for_header};
pub use scanner::{Scanner, TokenSpan, anchor_id, scan_document};
pub use template::{
    DEFAULT_MAX_DEPTH, Marker, RenderContext, Template, render, render_with_context,
};
pub use validate::{
    FieldDef, FunctionDef, Issue, IssueCode, Location, Metadata, Reference, ReferenceKind,
    References, Schema, SemanticOptions, Severity, Summary, SyntaxOptions, TokenRef, TypeInfo,
    TypeKind, ValidationResult, extract_references, normalize_path, validate_semantics,
    validate_syntax,
};
