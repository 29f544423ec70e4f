use crate::ast::{BinaryOp, Expr, ReferencePath, UnaryOp};
use crate::markup::MarkupKind;
use crate::parser::{parse_expression_strict, parse_for_header};
use crate::scanner::TokenSpan;

use super::report::{Issue, IssueCode, Severity};
use super::schema::{Resolution, Schema, SchemaIndex, TypeInfo, TypeKind, suggestions};

/// A variable bound by a `for` tag.
#[derive(Debug, Clone)]
struct Binding {
    name: String,
    ty: TypeInfo,
    /// Schema path of the collection the variable walks, if it has one.
    prefix: Option<String>,
}

/// One entry per open block; only loops bind variables.
type Scope = Vec<Binding>;

struct Checker<'s, 't> {
    schema: SchemaIndex<'s>,
    severity: Severity,
    scopes: Vec<Scope>,
    span: Option<&'t TokenSpan>,
    issues: Vec<Issue>,
}

impl<'s, 't> Checker<'s, 't> {
    fn new(schema: &'s Schema, strict: bool) -> Self {
        Self {
            schema: SchemaIndex::new(schema),
            severity: if strict {
                Severity::Error
            } else {
                Severity::Warning
            },
            scopes: Vec::new(),
            span: None,
            issues: Vec::new(),
        }
    }

    fn report(&mut self, code: IssueCode, message: String, suggestions: Vec<String>) {
        if let Some(span) = self.span {
            self.issues
                .push(Issue::at(span, self.severity, code, message).with_suggestions(suggestions));
        }
    }

    fn binding(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|binding| binding.name == name)
    }

    fn visit_span(&mut self, span: &'t TokenSpan) {
        let Some(token) = span.token.as_ref().filter(|_| !span.malformed) else {
            return;
        };
        self.span = Some(span);

        match token.kind {
            MarkupKind::Variable
            | MarkupKind::Include
            | MarkupKind::If
            | MarkupKind::Elsif
            | MarkupKind::Unless => {
                if let Ok(expr) = parse_expression_strict(&token.value) {
                    self.infer(&expr);
                }
                if matches!(token.kind, MarkupKind::If | MarkupKind::Unless) {
                    self.scopes.push(Scope::new());
                }
            }
            MarkupKind::For => {
                let scope = match parse_for_header(&token.value) {
                    Ok(header) => {
                        let collection = self.infer(&header.collection);
                        let prefix = header
                            .collection
                            .reference_path()
                            .and_then(|path| self.schema_path(&path));
                        let item = collection.element_kind.map_or_else(TypeInfo::unknown, TypeInfo::of);
                        let mut scope = vec![Binding {
                            name: header.variable,
                            ty: item,
                            prefix,
                        }];
                        if let Some(index) = header.index_variable {
                            scope.push(Binding {
                                name: index,
                                ty: TypeInfo::of(TypeKind::Number),
                                prefix: None,
                            });
                        }
                        scope
                    }
                    Err(_) => Scope::new(),
                };
                self.scopes.push(scope);
            }
            MarkupKind::End => {
                self.scopes.pop();
            }
            MarkupKind::Else | MarkupKind::PageBreak | MarkupKind::Text => {}
        }
    }

    /// The schema path a reference stands for, following loop variables back
    /// to their collections. `None` unless the schema describes that path.
    fn schema_path(&self, path: &ReferencePath) -> Option<String> {
        let candidate = match self.binding(&path.root) {
            Some(binding) => path.rebased(binding.prefix.as_ref()?).without_indices(),
            None => path.without_indices(),
        };
        self.schema.resolve(&candidate).map(|_| candidate)
    }

    fn infer_reference(&mut self, path: &ReferencePath) -> TypeInfo {
        let (lookup, display_root) = match self.binding(&path.root) {
            Some(binding) if path.segments.is_empty() => return binding.ty,
            Some(binding) => match &binding.prefix {
                Some(prefix) => (path.rebased(prefix), Some((prefix.clone(), binding.name.clone()))),
                // A loop over something the schema does not describe.
                None => return TypeInfo::unknown(),
            },
            None => (path.clone(), None),
        };

        let literal = lookup.to_string();
        let stripped = lookup.without_indices();
        let resolution = self
            .schema
            .resolve(&literal)
            .or_else(|| self.schema.resolve(&stripped));
        match resolution {
            Some(Resolution::Field(field)) => TypeInfo::from(field),
            Some(Resolution::Parent) => TypeInfo::of(TypeKind::Any),
            Some(Resolution::UnderAny) => TypeInfo::of(TypeKind::Any),
            None => {
                let found = match display_root {
                    // Suggest in terms of the loop variable the template uses.
                    Some((prefix, name)) => {
                        let member_prefix = format!("{}.", prefix);
                        let candidates: Vec<String> = self
                            .schema
                            .field_paths()
                            .filter_map(|p| p.strip_prefix(&member_prefix))
                            .map(|rest| format!("{}.{}", name, rest))
                            .collect();
                        suggestions(
                            &path.without_indices(),
                            candidates.iter().map(String::as_str),
                        )
                    }
                    None => suggestions(&stripped, self.schema.field_paths()),
                };
                self.report(
                    IssueCode::UnknownField,
                    format!("Unknown field '{}'", path),
                    found,
                );
                TypeInfo::unknown()
            }
        }
    }

    /// Visits dynamic index expressions inside an access chain.
    fn infer_indexes(&mut self, expr: &Expr) {
        match expr {
            Expr::FieldAccess { object, .. } => self.infer_indexes(object),
            Expr::IndexAccess { object, index } => {
                self.infer_indexes(object);
                self.infer(index);
            }
            Expr::Literal { .. }
            | Expr::Variable { .. }
            | Expr::UnaryOp { .. }
            | Expr::BinaryOp { .. }
            | Expr::FunctionCall { .. } => {}
        }
    }

    fn infer(&mut self, expr: &Expr) -> TypeInfo {
        if let Some(path) = expr.reference_path() {
            self.infer_indexes(expr);
            return self.infer_reference(&path);
        }

        match expr {
            Expr::Literal { value } => TypeInfo::of(TypeKind::of_value(value)),
            Expr::Variable { .. } => TypeInfo::unknown(),
            Expr::FieldAccess { object, .. } => {
                self.infer(object);
                TypeInfo::unknown()
            }
            Expr::IndexAccess { object, index } => {
                self.infer(object);
                self.infer(index);
                TypeInfo::unknown()
            }
            Expr::UnaryOp { op, operand } => {
                self.infer(operand);
                match op {
                    UnaryOp::Not => TypeInfo::of(TypeKind::Bool),
                    UnaryOp::Neg | UnaryOp::Plus => TypeInfo::of(TypeKind::Number),
                }
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.infer(left);
                let right = self.infer(right);
                if op.is_comparison() || op.is_logical() {
                    TypeInfo::of(TypeKind::Bool)
                } else if *op == BinaryOp::Add
                    && (left.kind == TypeKind::String || right.kind == TypeKind::String)
                {
                    TypeInfo::of(TypeKind::String)
                } else {
                    TypeInfo::of(TypeKind::Number)
                }
            }
            Expr::FunctionCall { name, args } => self.infer_call(name, args),
        }
    }

    fn infer_call(&mut self, name: &str, args: &[Expr]) -> TypeInfo {
        let arg_types: Vec<TypeInfo> = args.iter().map(|arg| self.infer(arg)).collect();

        let Some(function) = self.schema.function(name) else {
            let found = suggestions(name, self.schema.function_names());
            self.report(
                IssueCode::UnknownFunction,
                format!("Unknown function '{}'", name),
                found,
            );
            return TypeInfo::unknown();
        };

        if !function.accepts_count(args.len()) {
            self.report(
                IssueCode::FunctionArgumentError,
                format!(
                    "Function '{}' takes {} argument(s), found {}",
                    name,
                    function.describe_arity(),
                    args.len()
                ),
                Vec::new(),
            );
        }

        for (position, ty) in arg_types.iter().enumerate() {
            let Some(allowed) = function.allowed_kinds(position) else {
                continue;
            };
            if ty.is_permissive() || allowed.contains(&TypeKind::Any) || allowed.contains(&ty.kind) {
                continue;
            }
            let expected: Vec<&str> = allowed.iter().map(|kind| kind.as_str()).collect();
            self.report(
                IssueCode::TypeMismatch,
                format!(
                    "Argument {} of '{}' expects {}, found {}",
                    position.saturating_add(1),
                    name,
                    expected.join(" or "),
                    ty.kind
                ),
                Vec::new(),
            );
        }

        TypeInfo::of(function.return_kind)
    }
}

/// Checks field and function references against `schema`.
///
/// Findings are errors when `strict` is set and warnings otherwise.
pub(crate) fn check(spans: &[TokenSpan], schema: &Schema, strict: bool) -> Vec<Issue> {
    let mut checker = Checker::new(schema, strict);
    for span in spans {
        checker.visit_span(span);
    }
    tracing::debug!(
        tokens = spans.len(),
        issues = checker.issues.len(),
        strict,
        "checked semantics"
    );
    checker.issues
}
