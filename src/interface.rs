use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::DocxlateResult;

/// A dynamically typed value in a data context.
///
/// Integers and floats are kept apart so arithmetic can preserve integer
/// results where they are exact.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// `null`, zero, the empty string and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Object(map) => !map.is_empty(),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Null | Self::Bool(_) | Self::String(_) | Self::Array(_) | Self::Object(_) => None,
        }
    }

    /// The integer this value holds exactly, if any. Floats qualify when they
    /// have no fractional part and fit in an `i64`.
    pub fn as_exact_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 => {
                Some(*f as i64)
            }
            Self::Null
            | Self::Bool(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Array(_)
            | Self::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Array(_)
            | Self::Object(_) => None,
        }
    }

    /// Looks up `field` on an object. Anything else yields `None`.
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(field),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Array(_) => None,
        }
    }

    /// Coerces the value into the sequence a `for` loop walks.
    ///
    /// Arrays iterate their items, objects iterate their values in key order
    /// and `null` iterates nothing. Scalars are not iterable.
    pub fn to_sequence(&self) -> Option<Vec<Value>> {
        match self {
            Self::Null => Some(Vec::new()),
            Self::Array(items) => Some(items.clone()),
            Self::Object(map) => Some(map.values().cloned().collect()),
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_) => None,
        }
    }
}

/// The canonical string form used for substitution and concatenation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Object(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Object(value)
    }
}

/// The variables visible to an expression.
///
/// Scoping is copy-and-extend: a loop body sees a copy of its parent context
/// with the loop variables added, never a chained lookup.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context {
    data: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: AsRef<str>, V: Into<Value>>(&mut self, name: N, value: V) -> &mut Self {
        self.data.insert(name.as_ref().to_string(), value.into());
        self
    }

    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&Value> {
        self.data.get(name.as_ref())
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.data.contains_key(name.as_ref())
    }

    /// A copy of this context extended with `name`.
    pub fn with<N: AsRef<str>, V: Into<Value>>(&self, name: N, value: V) -> Self {
        let mut scoped = self.clone();
        scoped.insert(name, value);
        scoped
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }
}

impl<N: AsRef<str>, V: Into<Value>> FromIterator<(N, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (name, value) in iter {
            context.insert(name, value);
        }
        context
    }
}

/// A function callable from template expressions.
pub type Callable = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// Resolves function names used in expressions.
pub trait FunctionRegistry {
    fn lookup(&self, name: &str) -> Option<&Callable>;
}

/// A name to callable map.
#[derive(Default)]
pub struct Functions {
    functions: HashMap<String, Box<Callable>>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<N, F>(&mut self, name: N, function: F) -> &mut Self
    where
        N: Into<String>,
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }
}

impl FunctionRegistry for Functions {
    fn lookup(&self, name: &str) -> Option<&Callable> {
        self.functions.get(name).map(|f| f.as_ref())
    }
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Functions").field("names", &names).finish()
    }
}

/// The stored content of an includable fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Raw template text.
    Text(String),
    /// A `.docx` package whose body paragraphs form the template text.
    Docx(Vec<u8>),
}

/// Resolves fragment names used by `{{include ...}}`.
pub trait FragmentStore {
    fn lookup(&self, name: &str) -> Option<&Fragment>;
}

#[derive(Debug, Clone, Default)]
pub struct Fragments {
    fragments: HashMap<String, Fragment>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: Into<String>>(&mut self, name: N, fragment: Fragment) -> &mut Self {
        self.fragments.insert(name.into(), fragment);
        self
    }

    pub fn insert_text<N: Into<String>, T: Into<String>>(&mut self, name: N, text: T) -> &mut Self {
        self.insert(name, Fragment::Text(text.into()))
    }
}

impl FragmentStore for Fragments {
    fn lookup(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }
}

/// Read access to the parts of a document package.
pub trait PartSource {
    fn list_parts(&self) -> Vec<String>;

    /// # Errors
    /// - If the part does not exist or cannot be read.
    fn get_part(&self, name: &str) -> DocxlateResult<Vec<u8>>;
}
