use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::interface::Value;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TypeKind {
    /// Anything goes; declared by the schema.
    Any,
    /// Could not be inferred.
    #[default]
    Unknown,
    Null,
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl TypeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Unknown => "unknown",
            Self::Null => "null",
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Int(_) | Value::Float(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inferred type of an expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub known: bool,
    pub nullable: bool,
    /// Element kind of an array.
    pub element_kind: Option<TypeKind>,
}

impl TypeInfo {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn of(kind: TypeKind) -> Self {
        Self {
            kind,
            known: kind != TypeKind::Unknown,
            nullable: false,
            element_kind: None,
        }
    }

    /// Types that never cause a mismatch.
    pub fn is_permissive(&self) -> bool {
        !self.known || matches!(self.kind, TypeKind::Any | TypeKind::Unknown)
    }
}

impl From<&FieldDef> for TypeInfo {
    fn from(field: &FieldDef) -> Self {
        Self {
            kind: field.kind,
            known: field.kind != TypeKind::Unknown,
            nullable: field.nullable,
            element_kind: field.element_kind,
        }
    }
}

/// A known data path, e.g. `customer.name` or `order.lines[].sku`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub path: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: TypeKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub nullable: bool,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub element_kind: Option<TypeKind>,
}

impl FieldDef {
    pub fn new<P: Into<String>>(path: P, kind: TypeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            nullable: false,
            element_kind: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_element_kind(mut self, element_kind: TypeKind) -> Self {
        self.element_kind = Some(element_kind);
        self
    }
}

/// The signature of a callable function.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_args: usize,
    /// Negative for no upper bound.
    #[cfg_attr(feature = "serde", serde(default = "unbounded"))]
    pub max_args: i32,
    /// Allowed kinds per argument position. A variadic function's last entry
    /// applies to every further argument.
    #[cfg_attr(feature = "serde", serde(default))]
    pub arg_kinds: Vec<Vec<TypeKind>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub return_kind: TypeKind,
}

#[cfg(feature = "serde")]
fn unbounded() -> i32 {
    -1
}

impl FunctionDef {
    pub fn new<N: Into<String>>(name: N, min_args: usize, max_args: i32) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            arg_kinds: Vec::new(),
            return_kind: TypeKind::Unknown,
        }
    }

    pub fn with_args(mut self, arg_kinds: Vec<Vec<TypeKind>>) -> Self {
        self.arg_kinds = arg_kinds;
        self
    }

    pub fn returning(mut self, return_kind: TypeKind) -> Self {
        self.return_kind = return_kind;
        self
    }

    pub fn accepts_count(&self, count: usize) -> bool {
        count >= self.min_args
            && usize::try_from(self.max_args).map_or(true, |max| count <= max)
    }

    /// Kinds allowed at argument `position`, or `None` if unconstrained.
    pub fn allowed_kinds(&self, position: usize) -> Option<&[TypeKind]> {
        let kinds = match self.arg_kinds.get(position) {
            Some(kinds) => Some(kinds.as_slice()),
            None if self.max_args < 0 => self.arg_kinds.last().map(Vec::as_slice),
            None => None,
        };
        kinds.filter(|kinds| !kinds.is_empty())
    }

    pub fn describe_arity(&self) -> String {
        match usize::try_from(self.max_args) {
            Err(_) => format!("at least {}", self.min_args),
            Ok(max) if max == self.min_args => format!("exactly {}", max),
            Ok(max) => format!("{} to {}", self.min_args, max),
        }
    }
}

/// Known fields and functions for semantic validation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<FieldDef>,
    pub functions: Vec<FunctionDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn function(mut self, function: FunctionDef) -> Self {
        self.functions.push(function);
        self
    }
}

/// Removes wildcard array markers: `lines[].sku` and `lines[*].sku` both
/// become `lines.sku`.
pub fn normalize_path(path: &str) -> String {
    path.replace("[*]", "").replace("[]", "")
}

/// What a path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution<'s> {
    Field(&'s FieldDef),
    /// A proper prefix of some declared path, such as `order` for
    /// `order.total`.
    Parent,
    /// Below a field declared as `any`.
    UnderAny,
}

/// Lookup tables built once per validation.
#[derive(Debug)]
pub(crate) struct SchemaIndex<'s> {
    fields: BTreeMap<String, &'s FieldDef>,
    parents: BTreeSet<String>,
    functions: BTreeMap<&'s str, &'s FunctionDef>,
}

impl<'s> SchemaIndex<'s> {
    pub(crate) fn new(schema: &'s Schema) -> Self {
        let mut fields = BTreeMap::new();
        let mut parents = BTreeSet::new();
        for field in &schema.fields {
            let path = normalize_path(&field.path);
            for (dot, _) in path.match_indices('.') {
                parents.extend(path.get(..dot).map(str::to_string));
            }
            fields.entry(path).or_insert(field);
        }
        let functions = schema
            .functions
            .iter()
            .map(|function| (function.name.as_str(), function))
            .collect();
        Self {
            fields,
            parents,
            functions,
        }
    }

    pub(crate) fn resolve(&self, path: &str) -> Option<Resolution<'s>> {
        if let Some(field) = self.fields.get(path) {
            return Some(Resolution::Field(*field));
        }
        if self.parents.contains(path) {
            return Some(Resolution::Parent);
        }
        let under_any = path
            .rmatch_indices('.')
            .filter_map(|(dot, _)| path.get(..dot))
            .any(|ancestor| {
                self.fields
                    .get(ancestor)
                    .is_some_and(|field| field.kind == TypeKind::Any)
            });
        under_any.then_some(Resolution::UnderAny)
    }

    pub(crate) fn function(&self, name: &str) -> Option<&'s FunctionDef> {
        self.functions.get(name).copied()
    }

    pub(crate) fn field_paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().chain(self.parents.iter()).map(String::as_str)
    }

    pub(crate) fn function_names(&self) -> impl Iterator<Item = &'s str> + '_ {
        self.functions.keys().copied()
    }
}

/// Edit distance between two strings, counted in characters.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();

    // Row `i` holds the distances from the first `i` characters of `a`.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut curr = Vec::with_capacity(prev.len());
        curr.push(i.saturating_add(1));
        for ((cb, diagonal), above) in b.iter().zip(&prev).zip(prev.iter().skip(1)) {
            let left = curr.last().copied().unwrap_or_default();
            let cost = usize::from(ca != *cb);
            curr.push(
                above
                    .saturating_add(1)
                    .min(left.saturating_add(1))
                    .min(diagonal.saturating_add(cost)),
            );
        }
        prev = curr;
    }
    prev.last().copied().unwrap_or_default()
}

const MAX_SUGGESTIONS: usize = 3;
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Up to three candidates close to `name`, nearest first.
pub(crate) fn suggestions<'a, I>(name: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let name_lower = name.to_lowercase();
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|candidate| *candidate != name)
        .map(|candidate| {
            (
                levenshtein_distance(&name_lower, &candidate.to_lowercase()),
                candidate,
            )
        })
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .collect();
    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .field(FieldDef::new("customer.name", TypeKind::String))
            .field(FieldDef::new("order.lines[].sku", TypeKind::String))
            .field(FieldDef::new("order.lines[*].qty", TypeKind::Number))
            .field(FieldDef::new("meta", TypeKind::Any))
            .function(FunctionDef::new("upper", 1, 1).returning(TypeKind::String))
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_resolve() {
        let schema = schema();
        let index = SchemaIndex::new(&schema);
        assert!(matches!(
            index.resolve("customer.name"),
            Some(Resolution::Field(field)) if field.kind == TypeKind::String
        ));
        assert!(matches!(
            index.resolve("order.lines.qty"),
            Some(Resolution::Field(field)) if field.kind == TypeKind::Number
        ));
        assert_eq!(index.resolve("order.lines"), Some(Resolution::Parent));
        assert_eq!(index.resolve("order"), Some(Resolution::Parent));
        assert_eq!(index.resolve("meta.anything.at.all"), Some(Resolution::UnderAny));
        assert_eq!(index.resolve("customer.age"), None);
        assert_eq!(index.resolve("cust"), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_function_arity() {
        let exact = FunctionDef::new("f", 1, 1);
        assert!(!exact.accepts_count(0));
        assert!(exact.accepts_count(1));
        assert!(!exact.accepts_count(2));
        assert_eq!(exact.describe_arity(), "exactly 1");

        let variadic = FunctionDef::new("g", 1, -1)
            .with_args(vec![vec![TypeKind::String], vec![TypeKind::Number]]);
        assert!(variadic.accepts_count(100));
        assert_eq!(variadic.describe_arity(), "at least 1");
        assert_eq!(variadic.allowed_kinds(0), Some(&[TypeKind::String][..]));
        assert_eq!(variadic.allowed_kinds(5), Some(&[TypeKind::Number][..]));

        let bounded = FunctionDef::new("h", 0, 3).with_args(vec![vec![TypeKind::Bool]]);
        assert_eq!(bounded.allowed_kinds(1), None);
        assert_eq!(bounded.describe_arity(), "0 to 3");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_suggestions() {
        let candidates = ["customer.name", "customer.email", "order.total", "name"];
        let found = suggestions("customer.nmae", candidates);
        assert_eq!(found[0], "customer.name");
        assert!(found.len() <= 3);
        assert_eq!(suggestions("nam", candidates), vec!["name"]);
        assert!(suggestions("zzzzzzzz", candidates).is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("caf\u{e9}", "cafe"), 1);
    }
}
