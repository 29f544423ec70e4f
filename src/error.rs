use thiserror::Error;

pub type DocxlateResult<T> = std::result::Result<T, DocxlateError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum LexErrorKind {
    #[error("Unexpected character '{0}'")]
    UnexpectedCharacter(char),
    /// Carries the opening quote.
    #[error("Unterminated string opened with '{0}'")]
    UnterminatedString(char),
    /// A literal that does not fit in a finite number.
    #[error("Number out of range: {0}")]
    NumberOutOfRange(String),
}

/// A malformed expression, rejected before parsing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{kind} at byte {position}")]
pub struct LexError {
    /// Byte offset of the offending character or literal.
    pub position: usize,
    pub kind: LexErrorKind,
}

impl LexError {
    pub(crate) const fn new(position: usize, kind: LexErrorKind) -> Self {
        Self { position, kind }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseErrorKind {
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unexpected end of input{expected_what}")]
    UnexpectedEof {
        /// Describes what was expected, e.g., " (expected ')')"
        expected_what: String,
    },
    /// Strict parsing consumed a complete expression but input remained.
    #[error("Unexpected trailing token {found}")]
    TrailingToken { found: String },
    #[error("Invalid for loop: {reason}")]
    InvalidForLoop { reason: String },
    #[error("Unbalanced block: {message}")]
    UnbalancedBlock { message: String },
    #[error("Unclosed template tag")]
    UnclosedTag,
    #[error("{0}")]
    Lex(LexError),
}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<&str>) -> Self {
        Self::UnexpectedEof {
            expected_what: expected.map_or_else(String::new, |e| format!(" (expected {})", e)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Parse error at byte {position}: {kind}")]
pub struct ParseError {
    /// Byte offset into the parsed text.
    pub position: usize,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(position: usize, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }

    /// True when strict parsing rejected input left over after a complete
    /// expression.
    pub fn is_trailing_token(&self) -> bool {
        matches!(self.kind, ParseErrorKind::TrailingToken { .. })
    }
}

impl From<LexError> for ParseError {
    fn from(error: LexError) -> Self {
        Self {
            position: error.position,
            kind: ParseErrorKind::Lex(error),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum EvaluationError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Modulo by zero")]
    ModuloByZero,
    #[error("Modulo requires integer operands, found {left} and {right}")]
    NonIntegerModulo { left: String, right: String },
    #[error("Operator '{operator}' cannot be applied to {found}")]
    NonNumericOperand { operator: String, found: String },
    #[error("Cannot compare {left} with {right} using '{operator}'")]
    InvalidComparison {
        operator: String,
        left: String,
        right: String,
    },
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },
    #[error("Function {name} failed: {message}")]
    FunctionFailed { name: String, message: String },
    #[error("Cannot index with a value of type {found}")]
    InvalidIndexType { found: String },
    #[error("Cannot iterate over a value of type {found}")]
    NotIterable { found: String },
    #[error("Include name must be a string, found {found}")]
    IncludeNameNotString { found: String },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum DocxlateError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Circular fragment reference: {fragment} (stack: {})", .stack.join(" -> "))]
    CircularReference { fragment: String, stack: Vec<String> },
    #[error("Maximum include depth {max_depth} exceeded at depth {depth}")]
    MaxDepthExceeded { depth: usize, max_depth: usize },
    #[error("Fragment not found: {name}")]
    MissingFragment { name: String },
    #[error("Invalid document package: {message}")]
    Package { message: String },
    #[error("Invalid XML in {part}: {message}")]
    Xml { part: String, message: String },
}

impl From<zip::result::ZipError> for DocxlateError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Package {
            message: error.to_string(),
        }
    }
}
