use std::fmt;

use crate::interface::Value;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "|",
            Self::And => "&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }
}

/// An expression tree. Built once by the parser and evaluated any number of
/// times.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
    },
    Variable {
        name: String,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    IndexAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal<V: Into<Value>>(value: V) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    pub fn variable<N: Into<String>>(name: N) -> Self {
        Self::Variable { name: name.into() }
    }

    /// Whether the expression prints without surrounding parentheses when
    /// used as the object of a postfix access.
    fn is_postfix_safe(&self) -> bool {
        matches!(
            self,
            Self::Variable { .. }
                | Self::FieldAccess { .. }
                | Self::IndexAccess { .. }
                | Self::FunctionCall { .. }
                | Self::Literal {
                    value: Value::String(_) | Value::Bool(_) | Value::Null
                }
        )
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            other => write!(f, "{}", other)?,
        }
    }
    f.write_str("\"")
}

/// Fully parenthesized source form; parsing it again yields an equivalent
/// tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => match value {
                Value::Null => f.write_str("null"),
                Value::String(s) => write_quoted(f, s),
                Value::Float(x) => {
                    let text = x.to_string();
                    if !x.is_finite() {
                        // Non-finite floats have no literal form.
                        f.write_str("null")
                    } else if text.contains('.') {
                        f.write_str(&text)
                    } else {
                        write!(f, "{}.0", text)
                    }
                }
                Value::Bool(_) | Value::Int(_) | Value::Array(_) | Value::Object(_) => {
                    write!(f, "{}", value)
                }
            },
            Self::Variable { name } => f.write_str(name),
            Self::FieldAccess { object, field } => {
                if object.is_postfix_safe() {
                    write!(f, "{}.{}", object, field)
                } else {
                    write!(f, "({}).{}", object, field)
                }
            }
            Self::IndexAccess { object, index } => {
                if object.is_postfix_safe() {
                    write!(f, "{}[{}]", object, index)
                } else {
                    write!(f, "({})[{}]", object, index)
                }
            }
            Self::UnaryOp { op, operand } => write!(f, "{}({})", op.symbol(), operand),
            Self::BinaryOp { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Self::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One step of a [`ReferencePath`] after its root variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `.name`, or `["name"]` with a string literal key.
    Field(String),
    /// `[0]` or `.0`.
    Index(i64),
    /// `[expr]` with any other index expression.
    Dynamic,
}

/// A chain of field and index accesses rooted at a variable, such as
/// `order.lines[0].sku`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl ReferencePath {
    /// The path with index segments dropped: `order.lines.sku`.
    pub fn without_indices(&self) -> String {
        let mut path = self.root.clone();
        for segment in &self.segments {
            if let PathSegment::Field(field) = segment {
                path.push('.');
                path.push_str(field);
            }
        }
        path
    }

    /// The same path rooted at `prefix` instead of the root variable.
    pub fn rebased(&self, prefix: &str) -> Self {
        Self {
            root: prefix.to_string(),
            segments: self.segments.clone(),
        }
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(field) => write!(f, ".{}", field)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Dynamic => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

impl Expr {
    /// The access chain this expression reads, or `None` unless it is a
    /// variable followed by field and index accesses.
    ///
    /// Dynamic index expressions are not part of the path; callers that care
    /// about the variables they read must visit them separately.
    pub fn reference_path(&self) -> Option<ReferencePath> {
        match self {
            Self::Variable { name } => Some(ReferencePath {
                root: name.clone(),
                segments: Vec::new(),
            }),
            Self::FieldAccess { object, field } => {
                let mut path = object.reference_path()?;
                path.segments.push(PathSegment::Field(field.clone()));
                Some(path)
            }
            Self::IndexAccess { object, index } => {
                let mut path = object.reference_path()?;
                path.segments.push(match index.as_ref() {
                    Self::Literal {
                        value: Value::Int(i),
                    } => PathSegment::Index(*i),
                    Self::Literal {
                        value: Value::String(key),
                    } => PathSegment::Field(key.clone()),
                    Self::Literal { .. }
                    | Self::Variable { .. }
                    | Self::FieldAccess { .. }
                    | Self::IndexAccess { .. }
                    | Self::UnaryOp { .. }
                    | Self::BinaryOp { .. }
                    | Self::FunctionCall { .. } => PathSegment::Dynamic,
                });
                Some(path)
            }
            Self::Literal { .. }
            | Self::UnaryOp { .. }
            | Self::BinaryOp { .. }
            | Self::FunctionCall { .. } => None,
        }
    }
}

/// The header of a `for` tag: `item in items` or `i, item in items`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub index_variable: Option<String>,
    pub variable: String,
    pub collection: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElsifBranch {
    pub condition: Expr,
    pub body: Body,
}

/// A node of the control tree built from a template's markup tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text between tags.
    Text { content: String },
    /// A `{{expression}}` substitution.
    Expression { expr: Expr },
    If {
        condition: Expr,
        then_body: Body,
        elsifs: Vec<ElsifBranch>,
        else_body: Option<Body>,
    },
    Unless {
        condition: Expr,
        then_body: Body,
        else_body: Option<Body>,
    },
    For {
        variable: String,
        index_variable: Option<String>,
        collection: Expr,
        body: Body,
    },
    Include { name: Expr },
    PageBreak,
}

pub type Body = Vec<Node>;
