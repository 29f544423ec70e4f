use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::ast::{Body, ElsifBranch, Expr, Node};
use crate::error::{DocxlateError, DocxlateResult, EvaluationError, ParseError, ParseErrorKind};
use crate::eval::Evaluator;
use crate::interface::{Context, Fragment, FragmentStore, Value};
use crate::markup::{MarkupKind, MarkupToken, tokenize_markup};
use crate::parser::{parse_expression_strict, parse_for_header};

/// Default bound on nested `{{include}}` depth.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// A Template is parsed template text, held as a control tree that can be
/// rendered any number of times against different data.
///
/// # Example
///
/// ```rust
/// use docxlate::{Context, Template};
///
/// let template = Template::parse("Hello, {{ name }}!").unwrap();
///
/// let mut context = Context::new();
/// context.insert("name", "World");
///
/// assert_eq!(template.render(&context).unwrap(), "Hello, World!");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    body: Body,
}

impl Template {
    /// Parses template text into a control tree.
    ///
    /// # Errors
    ///
    /// Returns a `DocxlateError::Parse` error if a tag is unclosed, an
    /// expression is invalid, or the blocks do not balance.
    pub fn parse<T: Into<String>>(source: T) -> DocxlateResult<Self> {
        let source = source.into();
        let tokens = tokenize_markup(&source)?;
        let body = TreeBuilder::new(tokens, source.len()).build()?;
        Ok(Self { source, body })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Renders with no fragments or functions available.
    ///
    /// # Errors
    /// - Any evaluation error, or an include of any fragment.
    pub fn render(&self, data: &Context) -> DocxlateResult<String> {
        render(&self.body, data)
    }

    /// The data paths this template reads, in first-use order, without the
    /// names bound by its own loops.
    ///
    /// ```
    /// use docxlate::Template;
    ///
    /// let template =
    ///     Template::parse("{{for item in order.items}}{{item.name}}{{end}}{{total}}").unwrap();
    /// assert_eq!(template.references(), vec!["order.items", "total"]);
    /// ```
    pub fn references(&self) -> Vec<String> {
        let mut references = Vec::new();
        collect_body_references(&self.body, &mut Vec::new(), &mut references);
        references
    }
}

fn collect_body_references(body: &Body, locals: &mut Vec<String>, references: &mut Vec<String>) {
    for node in body {
        match node {
            Node::Text { .. } | Node::PageBreak => {}
            Node::Expression { expr } | Node::Include { name: expr } => {
                collect_expr_references(expr, locals, references);
            }
            Node::If {
                condition,
                then_body,
                elsifs,
                else_body,
            } => {
                collect_expr_references(condition, locals, references);
                collect_body_references(then_body, locals, references);
                for branch in elsifs {
                    collect_expr_references(&branch.condition, locals, references);
                    collect_body_references(&branch.body, locals, references);
                }
                if let Some(else_body) = else_body {
                    collect_body_references(else_body, locals, references);
                }
            }
            Node::Unless {
                condition,
                then_body,
                else_body,
            } => {
                collect_expr_references(condition, locals, references);
                collect_body_references(then_body, locals, references);
                if let Some(else_body) = else_body {
                    collect_body_references(else_body, locals, references);
                }
            }
            Node::For {
                variable,
                index_variable,
                collection,
                body,
            } => {
                collect_expr_references(collection, locals, references);
                let scope_len = locals.len();
                locals.push(variable.clone());
                locals.extend(index_variable.iter().cloned());
                collect_body_references(body, locals, references);
                locals.truncate(scope_len);
            }
        }
    }
}

fn collect_expr_references(expr: &Expr, locals: &[String], references: &mut Vec<String>) {
    if let Some(path) = expr.reference_path() {
        if !locals.contains(&path.root) {
            let path = path.to_string();
            if !references.contains(&path) {
                references.push(path);
            }
        }
        collect_index_references(expr, locals, references);
        return;
    }
    match expr {
        Expr::Literal { .. } | Expr::Variable { .. } => {}
        Expr::FieldAccess { object, .. } => collect_expr_references(object, locals, references),
        Expr::IndexAccess { object, index } => {
            collect_expr_references(object, locals, references);
            collect_expr_references(index, locals, references);
        }
        Expr::UnaryOp { operand, .. } => collect_expr_references(operand, locals, references),
        Expr::BinaryOp { left, right, .. } => {
            collect_expr_references(left, locals, references);
            collect_expr_references(right, locals, references);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_expr_references(arg, locals, references);
            }
        }
    }
}

/// Visits the computed indexes along an access chain, e.g. `i` in `xs[i].name`.
fn collect_index_references(expr: &Expr, locals: &[String], references: &mut Vec<String>) {
    match expr {
        Expr::FieldAccess { object, .. } => collect_index_references(object, locals, references),
        Expr::IndexAccess { object, index } => {
            collect_index_references(object, locals, references);
            collect_expr_references(index, locals, references);
        }
        Expr::Literal { .. }
        | Expr::Variable { .. }
        | Expr::UnaryOp { .. }
        | Expr::BinaryOp { .. }
        | Expr::FunctionCall { .. } => {}
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Builds the control tree from a flat markup token stream.
struct TreeBuilder {
    tokens: Vec<MarkupToken>,
    pos: usize,
    source_len: usize,
}

impl TreeBuilder {
    fn new(tokens: Vec<MarkupToken>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            source_len,
        }
    }

    fn build(mut self) -> ParseResult<Body> {
        let (body, terminator) = self.parse_body(&[])?;
        debug_assert!(terminator.is_none());
        Ok(body)
    }

    /// Parses nodes until one of `terminators` (consumed and returned) or the
    /// end of input.
    fn parse_body(&mut self, terminators: &[MarkupKind]) -> ParseResult<(Body, Option<MarkupToken>)> {
        let mut body = Vec::new();
        while let Some(token) = self.tokens.get(self.pos).cloned() {
            self.pos = self.pos.saturating_add(1);
            if terminators.contains(&token.kind) {
                return Ok((body, Some(token)));
            }
            body.push(self.parse_node(token)?);
        }
        Ok((body, None))
    }

    fn expression(token: &MarkupToken) -> ParseResult<Expr> {
        parse_expression_strict(&token.value).map_err(|mut err| {
            err.position = err.position.saturating_add(token.value_offset);
            err
        })
    }

    fn unbalanced(token: &MarkupToken, message: &str) -> ParseError {
        ParseError::new(
            token.value_offset,
            ParseErrorKind::UnbalancedBlock {
                message: message.to_string(),
            },
        )
    }

    fn missing_end(&self, opener: &MarkupToken) -> ParseError {
        ParseError::new(
            self.source_len,
            ParseErrorKind::unexpected_eof(Some(&format!(
                "{{{{end}}}} for '{}' opened at byte {}",
                opener.kind.keyword(),
                opener.value_offset
            ))),
        )
    }

    fn parse_node(&mut self, token: MarkupToken) -> ParseResult<Node> {
        match token.kind {
            MarkupKind::Text => Ok(Node::Text {
                content: token.value,
            }),
            MarkupKind::Variable => Ok(Node::Expression {
                expr: Self::expression(&token)?,
            }),
            MarkupKind::PageBreak => Ok(Node::PageBreak),
            MarkupKind::Include => Ok(Node::Include {
                name: Self::expression(&token)?,
            }),
            MarkupKind::If => self.parse_if(token),
            MarkupKind::Unless => self.parse_unless(token),
            MarkupKind::For => self.parse_for(token),
            MarkupKind::Elsif => Err(Self::unbalanced(&token, "elsif outside of an if block")),
            MarkupKind::Else => Err(Self::unbalanced(&token, "else outside of an if or unless block")),
            MarkupKind::End => Err(Self::unbalanced(&token, "end without an open block")),
        }
    }

    fn parse_if(&mut self, opener: MarkupToken) -> ParseResult<Node> {
        let condition = Self::expression(&opener)?;
        let branch_terminators = [MarkupKind::Elsif, MarkupKind::Else, MarkupKind::End];

        let (then_body, mut terminator) = self.parse_body(&branch_terminators)?;
        let mut elsifs = Vec::new();
        let mut else_body = None;

        loop {
            match terminator {
                Some(token) if token.kind == MarkupKind::Elsif => {
                    let condition = Self::expression(&token)?;
                    let (body, next) = self.parse_body(&branch_terminators)?;
                    elsifs.push(ElsifBranch { condition, body });
                    terminator = next;
                }
                Some(token) if token.kind == MarkupKind::Else => {
                    let (body, next) =
                        self.parse_body(&[MarkupKind::Elsif, MarkupKind::Else, MarkupKind::End])?;
                    match next {
                        Some(ref late) if late.kind == MarkupKind::Elsif => {
                            return Err(Self::unbalanced(late, "elsif after else"));
                        }
                        Some(ref late) if late.kind == MarkupKind::Else => {
                            return Err(Self::unbalanced(late, "duplicate else"));
                        }
                        Some(_) => {}
                        None => return Err(self.missing_end(&opener)),
                    }
                    else_body = Some(body);
                    break;
                }
                Some(_) => break,
                None => return Err(self.missing_end(&opener)),
            }
        }

        Ok(Node::If {
            condition,
            then_body,
            elsifs,
            else_body,
        })
    }

    fn parse_unless(&mut self, opener: MarkupToken) -> ParseResult<Node> {
        let condition = Self::expression(&opener)?;
        let (then_body, terminator) = self.parse_body(&[MarkupKind::Else, MarkupKind::End])?;
        let else_body = match terminator {
            Some(token) if token.kind == MarkupKind::Else => {
                let (body, next) = self.parse_body(&[MarkupKind::Else, MarkupKind::End])?;
                match next {
                    Some(ref late) if late.kind == MarkupKind::Else => {
                        return Err(Self::unbalanced(late, "duplicate else"));
                    }
                    Some(_) => Some(body),
                    None => return Err(self.missing_end(&opener)),
                }
            }
            Some(_) => None,
            None => return Err(self.missing_end(&opener)),
        };
        Ok(Node::Unless {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_for(&mut self, opener: MarkupToken) -> ParseResult<Node> {
        let header = parse_for_header(&opener.value).map_err(|mut err| {
            err.position = err.position.saturating_add(opener.value_offset);
            err
        })?;
        let (body, terminator) = self.parse_body(&[MarkupKind::End])?;
        if terminator.is_none() {
            return Err(self.missing_end(&opener));
        }
        Ok(Node::For {
            variable: header.variable,
            index_variable: header.index_variable,
            collection: header.collection,
            body,
        })
    }
}

/// A value generated during rendering that the document writer replaces
/// after the text has been woven back into runs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Marker {
    PageBreak,
}

/// Mutable state for one render call.
///
/// Not shared between concurrent renders; create one per call.
#[derive(Debug, Default)]
pub struct RenderContext {
    fragment_stack: Vec<String>,
    markers: BTreeMap<String, Marker>,
    next_marker: usize,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments currently being rendered, outermost first.
    pub fn fragment_stack(&self) -> &[String] {
        &self.fragment_stack
    }

    pub fn depth(&self) -> usize {
        self.fragment_stack.len()
    }

    pub fn markers(&self) -> &BTreeMap<String, Marker> {
        &self.markers
    }

    /// Records `marker` under a fresh synthetic ID and returns the ID.
    pub fn add_marker(&mut self, marker: Marker) -> String {
        let kind = match marker {
            Marker::PageBreak => "pagebreak",
        };
        let id = format!("docxlate:{}:{}", kind, self.next_marker);
        self.next_marker = self.next_marker.saturating_add(1);
        self.markers.insert(id.clone(), marker);
        id
    }

    /// Pushes `name` onto the fragment stack. The returned guard pops it when
    /// dropped, including on early error returns.
    fn enter_fragment(&mut self, name: &str, max_depth: usize) -> DocxlateResult<FragmentGuard<'_>> {
        if self.fragment_stack.iter().any(|open| open == name) {
            return Err(DocxlateError::CircularReference {
                fragment: name.to_string(),
                stack: self.fragment_stack.clone(),
            });
        }
        if self.depth() >= max_depth {
            return Err(DocxlateError::MaxDepthExceeded {
                depth: self.depth(),
                max_depth,
            });
        }
        self.fragment_stack.push(name.to_string());
        tracing::debug!(fragment = name, depth = self.depth(), "entering fragment");
        Ok(FragmentGuard { context: self })
    }
}

struct FragmentGuard<'c> {
    context: &'c mut RenderContext,
}

impl Drop for FragmentGuard<'_> {
    fn drop(&mut self) {
        let left = self.context.fragment_stack.pop();
        tracing::debug!(fragment = ?left, "leaving fragment");
    }
}

impl Deref for FragmentGuard<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.context
    }
}

impl DerefMut for FragmentGuard<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        self.context
    }
}

/// Everything a render needs besides the data and the per-call context.
#[derive(Clone, Copy)]
pub(crate) struct Renderer<'e> {
    pub(crate) evaluator: Evaluator<'e>,
    pub(crate) fragments: Option<&'e dyn FragmentStore>,
    pub(crate) max_depth: usize,
}

impl Default for Renderer<'_> {
    fn default() -> Self {
        Self {
            evaluator: Evaluator::new(),
            fragments: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Renderer<'_> {
    pub(crate) fn render_body(
        &self,
        body: &Body,
        data: &Context,
        context: &mut RenderContext,
        output: &mut String,
    ) -> DocxlateResult<()> {
        for node in body {
            self.render_node(node, data, context, output)?;
        }
        Ok(())
    }

    fn render_node(
        &self,
        node: &Node,
        data: &Context,
        context: &mut RenderContext,
        output: &mut String,
    ) -> DocxlateResult<()> {
        match node {
            Node::Text { content } => output.push_str(content),
            Node::Expression { expr } => {
                let value = self.evaluator.evaluate(expr, data)?;
                output.push_str(&value.to_string());
            }
            Node::If {
                condition,
                then_body,
                elsifs,
                else_body,
            } => {
                if self.evaluator.evaluate(condition, data)?.is_truthy() {
                    return self.render_body(then_body, data, context, output);
                }
                for branch in elsifs {
                    if self.evaluator.evaluate(&branch.condition, data)?.is_truthy() {
                        return self.render_body(&branch.body, data, context, output);
                    }
                }
                if let Some(else_body) = else_body {
                    self.render_body(else_body, data, context, output)?;
                }
            }
            Node::Unless {
                condition,
                then_body,
                else_body,
            } => {
                if !self.evaluator.evaluate(condition, data)?.is_truthy() {
                    self.render_body(then_body, data, context, output)?;
                } else if let Some(else_body) = else_body {
                    self.render_body(else_body, data, context, output)?;
                }
            }
            Node::For {
                variable,
                index_variable,
                collection,
                body,
            } => {
                let collection = self.evaluator.evaluate(collection, data)?;
                let items = collection
                    .to_sequence()
                    .ok_or_else(|| EvaluationError::NotIterable {
                        found: collection.type_name().to_string(),
                    })?;
                for (index, item) in items.into_iter().enumerate() {
                    let mut scoped = data.with(variable, item);
                    if let Some(index_variable) = index_variable {
                        scoped.insert(index_variable, Value::Int(index as i64));
                    }
                    self.render_body(body, &scoped, context, output)?;
                }
            }
            Node::Include { name } => self.render_include(name, data, context, output)?,
            Node::PageBreak => {
                let id = context.add_marker(Marker::PageBreak);
                output.push('\u{27E6}');
                output.push_str(&id);
                output.push('\u{27E7}');
            }
        }
        Ok(())
    }

    fn render_include(
        &self,
        name: &Expr,
        data: &Context,
        context: &mut RenderContext,
        output: &mut String,
    ) -> DocxlateResult<()> {
        let value = self.evaluator.evaluate(name, data)?;
        let found = value.type_name();
        let Value::String(name) = value else {
            return Err(EvaluationError::IncludeNameNotString {
                found: found.to_string(),
            }
            .into());
        };

        let mut guard = context.enter_fragment(&name, self.max_depth)?;

        let fragment = self
            .fragments
            .and_then(|store| store.lookup(&name))
            .ok_or_else(|| DocxlateError::MissingFragment { name: name.clone() })?;
        let template = match fragment {
            Fragment::Text(text) => Template::parse(text.as_str())?,
            Fragment::Docx(bytes) => Template::parse(crate::docx::body_text(bytes)?)?,
        };

        self.render_body(&template.body, data, &mut guard, output)
    }
}

/// Renders a control tree with no fragments or functions available.
///
/// # Errors
/// - Any evaluation error, or an include of any fragment.
pub fn render(body: &Body, data: &Context) -> DocxlateResult<String> {
    render_with_context(body, data, &mut RenderContext::new())
}

/// As [`render`], recording state in a caller-supplied context.
///
/// # Errors
/// - See [`render`].
pub fn render_with_context(
    body: &Body,
    data: &Context,
    context: &mut RenderContext,
) -> DocxlateResult<String> {
    let mut output = String::new();
    Renderer::default().render_body(body, data, context, &mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ForHeader;

    fn render_str(source: &str, data: &Context) -> DocxlateResult<String> {
        Template::parse(source)?.render(data)
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_template() {
        let template = Template::parse("").unwrap();
        assert!(template.body().is_empty());
        assert_eq!(template.render(&Context::new()).unwrap(), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_tree_shape() {
        let template = Template::parse("a{{if x}}b{{elsif y}}c{{else}}d{{end}}").unwrap();
        assert_eq!(
            template.body(),
            &vec![
                Node::Text {
                    content: "a".to_string()
                },
                Node::If {
                    condition: Expr::variable("x"),
                    then_body: vec![Node::Text {
                        content: "b".to_string()
                    }],
                    elsifs: vec![ElsifBranch {
                        condition: Expr::variable("y"),
                        body: vec![Node::Text {
                            content: "c".to_string()
                        }],
                    }],
                    else_body: Some(vec![Node::Text {
                        content: "d".to_string()
                    }]),
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_for_node_from_header() {
        let template = Template::parse("{{for i, x in xs}}{{x}}{{end}}").unwrap();
        let ForHeader {
            index_variable,
            variable,
            collection,
        } = parse_for_header("i, x in xs").unwrap();
        assert_eq!(
            template.body(),
            &vec![Node::For {
                variable,
                index_variable,
                collection,
                body: vec![Node::Expression {
                    expr: Expr::variable("x")
                }],
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_if_elsif_else_picks_first_truthy() {
        let source = "{{if a}}A{{elsif b}}B{{elsif c}}C{{else}}D{{end}}";
        let cases = [
            ((true, true, true), "A"),
            ((false, true, true), "B"),
            ((false, false, true), "C"),
            ((false, false, false), "D"),
        ];
        for ((a, b, c), expected) in cases {
            let data: Context = [("a", a), ("b", b), ("c", c)].into_iter().collect();
            assert_eq!(render_str(source, &data).unwrap(), expected);
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unless() {
        let source = "{{unless done}}todo{{else}}finished{{end}}";
        let data: Context = [("done", false)].into_iter().collect();
        assert_eq!(render_str(source, &data).unwrap(), "todo");
        let data: Context = [("done", true)].into_iter().collect();
        assert_eq!(render_str(source, &data).unwrap(), "finished");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_for_with_index_and_separator() {
        let mut data = Context::new();
        let companies: Vec<Value> = ["A", "B", "C"]
            .into_iter()
            .map(|name| {
                let mut company = BTreeMap::new();
                company.insert("name".to_string(), Value::from(name));
                Value::Object(company)
            })
            .collect();
        data.insert("companies", companies);

        let source = "{{for i, company in companies}}{{if i > 0}}, {{end}}{{company.name}}{{end}}";
        assert_eq!(render_str(source, &data).unwrap(), "A, B, C");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_loop_variables_do_not_leak() {
        let mut data = Context::new();
        data.insert("xs", vec![1, 2]).insert("x", "outer");
        let source = "{{for x in xs}}{{x}}{{end}}-{{x}}-{{i}}";
        assert_eq!(render_str(source, &data).unwrap(), "12-outer-");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_null_collection_renders_nothing() {
        assert_eq!(
            render_str("[{{for x in missing}}{{x}}{{end}}]", &Context::new()).unwrap(),
            "[]"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_scalar_collection_is_an_error() {
        let data: Context = [("n", 3)].into_iter().collect();
        let err = render_str("{{for x in n}}{{x}}{{end}}", &data).unwrap_err();
        assert!(matches!(
            err,
            DocxlateError::Evaluation(EvaluationError::NotIterable { .. })
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_evaluation_error_propagates() {
        let err = render_str("before {{1 / 0}} after", &Context::new()).unwrap_err();
        assert_eq!(
            err,
            DocxlateError::Evaluation(EvaluationError::DivisionByZero)
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_page_break_records_marker() {
        let template = Template::parse("a{{pageBreak}}b{{pageBreak}}").unwrap();
        let mut context = RenderContext::new();
        let output = render_with_context(template.body(), &Context::new(), &mut context).unwrap();
        assert_eq!(
            output,
            "a\u{27E6}docxlate:pagebreak:0\u{27E7}b\u{27E6}docxlate:pagebreak:1\u{27E7}"
        );
        assert_eq!(context.markers().len(), 2);
        assert_eq!(
            context.markers().get("docxlate:pagebreak:1"),
            Some(&Marker::PageBreak)
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_include_without_store_is_missing_fragment() {
        let mut context = RenderContext::new();
        let template = Template::parse("{{include \"x\"}}").unwrap();
        let err = render_with_context(template.body(), &Context::new(), &mut context).unwrap_err();
        assert_eq!(
            err,
            DocxlateError::MissingFragment {
                name: "x".to_string()
            }
        );
        assert!(context.fragment_stack().is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_parse_errors() {
        let cases = [
            "{{if x}}never closed",
            "{{end}}",
            "{{else}}",
            "{{elsif x}}",
            "{{if x}}{{else}}{{else}}{{end}}",
            "{{if x}}{{else}}{{elsif y}}{{end}}",
            "{{unless x}}{{elsif y}}{{end}}",
            "{{for x in}}{{end}}",
            "{{for x in xs}}",
            "{{a +}}",
            "{{name",
        ];
        for source in cases {
            assert!(
                matches!(Template::parse(source), Err(DocxlateError::Parse(_))),
                "{} should fail to parse",
                source
            );
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expression_error_position_is_in_source() {
        let err = Template::parse("abc {{ a + }}").unwrap_err();
        let DocxlateError::Parse(err) = err else {
            panic!("expected a parse error");
        };
        // Points at the end of the expression `a +`.
        assert_eq!(err.position, 10);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_references() {
        let template = Template::parse(
            "{{customer.name}}{{for i, line in order.lines}}{{line.sku}}{{i}}{{end}}\
             {{if total > limit}}{{format(total)}}{{end}}{{customer.name}}",
        )
        .unwrap();
        assert_eq!(
            template.references(),
            vec!["customer.name", "order.lines", "total", "limit"]
        );
    }
}
