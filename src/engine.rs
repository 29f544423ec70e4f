use crate::error::DocxlateResult;
use crate::eval::Evaluator;
use crate::interface::{Context, FragmentStore, Fragments, FunctionRegistry, Functions};
use crate::template::{DEFAULT_MAX_DEPTH, RenderContext, Renderer, Template};

/// Settings shared by every render an [`Engine`] performs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many `{{include}}` levels may be open at once.
    pub max_depth: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// `Engine` renders templates with access to includable fragments and
/// callable functions.
///
/// An engine is immutable while rendering, so one engine and any number of
/// parsed templates can be shared between threads. Each render call gets its
/// own [`RenderContext`].
///
/// # Examples
///
/// ```
/// use docxlate::{Context, Engine, Fragments, Functions, Template, Value};
///
/// let mut fragments = Fragments::new();
/// fragments.insert_text("signature", "Regards, {{ sender }}");
///
/// let mut functions = Functions::new();
/// functions.register("upper", |args: &[Value]| {
///     Ok(Value::from(args[0].to_string().to_uppercase()))
/// });
///
/// let engine = Engine::new().with_fragments(fragments).with_functions(functions);
///
/// let template = Template::parse("Dear {{ upper(name) }}. {{include \"signature\"}}").unwrap();
///
/// let mut context = Context::new();
/// context.insert("name", "Ada").insert("sender", "Bob");
///
/// assert_eq!(
///     engine.render(&template, &context).unwrap(),
///     "Dear ADA. Regards, Bob"
/// );
/// ```
pub struct Engine {
    fragments: Box<dyn FragmentStore + Send + Sync>,
    functions: Box<dyn FunctionRegistry + Send + Sync>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with no fragments, no functions and the default
    /// configuration.
    pub fn new() -> Self {
        Self {
            fragments: Box::new(Fragments::new()),
            functions: Box::new(Functions::new()),
            config: EngineConfig::default(),
        }
    }

    /// Replaces the fragment store consulted by `{{include}}`.
    pub fn with_fragments<S>(mut self, fragments: S) -> Self
    where
        S: FragmentStore + Send + Sync + 'static,
    {
        self.fragments = Box::new(fragments);
        self
    }

    /// Replaces the registry that function calls resolve against.
    pub fn with_functions<R>(mut self, functions: R) -> Self
    where
        R: FunctionRegistry + Send + Sync + 'static,
    {
        self.functions = Box::new(functions);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn renderer(&self) -> Renderer<'_> {
        let fragments: &dyn FragmentStore = self.fragments.as_ref();
        Renderer {
            evaluator: Evaluator::with_functions(self.functions.as_ref()),
            fragments: Some(fragments),
            max_depth: self.config.max_depth,
        }
    }

    /// Renders `template` against `data`.
    ///
    /// # Arguments
    ///
    /// * `template` - A parsed template
    /// * `data` - The variables visible to the template
    ///
    /// # Errors
    ///
    /// * `DocxlateError::Evaluation` if an expression fails to evaluate
    /// * `DocxlateError::MissingFragment` if an include names an unknown fragment
    /// * `DocxlateError::CircularReference` if a fragment includes itself, directly or not
    /// * `DocxlateError::MaxDepthExceeded` if includes nest deeper than `max_depth`
    /// * `DocxlateError::Parse` if an included fragment does not parse
    pub fn render(&self, template: &Template, data: &Context) -> DocxlateResult<String> {
        self.render_with_context(template, data, &mut RenderContext::new())
    }

    /// As [`Engine::render`], recording markers and fragment state in
    /// `context`.
    ///
    /// # Errors
    ///
    /// See [`Engine::render`].
    pub fn render_with_context(
        &self,
        template: &Template,
        data: &Context,
        context: &mut RenderContext,
    ) -> DocxlateResult<String> {
        let mut output = String::new();
        self.renderer()
            .render_body(template.body(), data, context, &mut output)?;
        Ok(output)
    }

    /// Parses and renders `source` in one step.
    ///
    /// # Errors
    ///
    /// Any parse error of `source`, or any error of [`Engine::render`].
    pub fn render_str(&self, source: &str, data: &Context) -> DocxlateResult<String> {
        self.render(&Template::parse(source)?, data)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
