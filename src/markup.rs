use crate::error::{ParseError, ParseErrorKind};

pub const OPEN_DELIMITER: &str = "{{";
pub const CLOSE_DELIMITER: &str = "}}";

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkupKind {
    Text,
    Variable,
    If,
    Elsif,
    Else,
    Unless,
    For,
    End,
    Include,
    PageBreak,
}

impl MarkupKind {
    /// Kinds that open, continue or close a block.
    pub const fn is_control(self) -> bool {
        !matches!(self, Self::Text | Self::Variable)
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Variable => "variable",
            Self::If => "if",
            Self::Elsif => "elsif",
            Self::Else => "else",
            Self::Unless => "unless",
            Self::For => "for",
            Self::End => "end",
            Self::Include => "include",
            Self::PageBreak => "pageBreak",
        }
    }
}

/// A classified piece of template text.
///
/// For `Text` the value is the literal text. For tags it is whatever follows
/// the keyword: the condition of an `if`, the header of a `for`, the whole
/// expression of a variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkupToken {
    pub kind: MarkupKind,
    pub value: String,
    /// Byte offset of `value` in the text the token was lexed from.
    pub value_offset: usize,
}

impl MarkupToken {
    fn text(value: &str, value_offset: usize) -> Self {
        Self {
            kind: MarkupKind::Text,
            value: value.to_string(),
            value_offset,
        }
    }
}

/// Whether `rest` begins a new word, i.e. `keyword` was not a prefix of a
/// longer identifier.
fn at_word_boundary(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}

/// Splits `keyword` off the front of `text`, returning the remainder.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    text.strip_prefix(keyword).filter(|rest| at_word_boundary(rest))
}

/// Classifies the inner text of one `{{...}}` tag.
///
/// Returns the kind and the byte range of its value within `inner`.
fn classify_range(inner: &str) -> (MarkupKind, usize, usize) {
    let leading = inner.len().saturating_sub(inner.trim_start().len());
    let trimmed = inner.trim();
    let end = leading.saturating_add(trimmed.len());

    // Every remainder below is a suffix of `trimmed`, so it ends at `end`.
    let value_range = |rest: &str| (end.saturating_sub(rest.trim_start().len()), end);

    if trimmed == "pageBreak" {
        return (MarkupKind::PageBreak, end, end);
    }

    if let Some(rest) = strip_keyword(trimmed, "else") {
        // `else if` is spelled `elsif`.
        if let Some(condition) = strip_keyword(rest.trim_start(), "if") {
            let (start, stop) = value_range(condition);
            return (MarkupKind::Elsif, start, stop);
        }
        let (start, stop) = value_range(rest);
        return (MarkupKind::Else, start, stop);
    }

    for (keyword, kind) in [
        ("elsif", MarkupKind::Elsif),
        ("if", MarkupKind::If),
        ("unless", MarkupKind::Unless),
        ("for", MarkupKind::For),
        ("end", MarkupKind::End),
        ("include", MarkupKind::Include),
    ] {
        if let Some(rest) = strip_keyword(trimmed, keyword) {
            let (start, stop) = value_range(rest);
            return (kind, start, stop);
        }
    }

    (MarkupKind::Variable, leading, end)
}

/// Classifies the inner text of one tag, without its delimiters.
///
/// ```
/// use docxlate::{classify, MarkupKind};
///
/// let token = classify(" for item in items ");
/// assert_eq!(token.kind, MarkupKind::For);
/// assert_eq!(token.value, "item in items");
/// ```
pub fn classify(inner: &str) -> MarkupToken {
    let (kind, start, end) = classify_range(inner);
    MarkupToken {
        kind,
        value: inner.get(start..end).unwrap_or_default().to_string(),
        value_offset: start,
    }
}

/// Splits template text into literal text and classified tags.
///
/// # Errors
/// - [`ParseErrorKind::UnclosedTag`] if a `{{` has no matching `}}` before the
///   end of the input or before the next `{{`.
pub fn tokenize_markup(input: &str) -> Result<Vec<MarkupToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(rest) = input.get(pos..).filter(|rest| !rest.is_empty()) {
        let Some(open) = rest.find(OPEN_DELIMITER) else {
            tokens.push(MarkupToken::text(rest, pos));
            break;
        };

        if open > 0 {
            tokens.push(MarkupToken::text(rest.get(..open).unwrap_or_default(), pos));
        }

        let open = pos.saturating_add(open);
        let inner_start = open.saturating_add(OPEN_DELIMITER.len());
        let after_open = input.get(inner_start..).unwrap_or_default();
        let close = match (after_open.find(CLOSE_DELIMITER), after_open.find(OPEN_DELIMITER)) {
            (Some(close), Some(reopen)) if reopen < close => None,
            (close, _) => close,
        };
        let Some(close) = close else {
            return Err(ParseError::new(open, ParseErrorKind::UnclosedTag));
        };

        let mut token = classify(after_open.get(..close).unwrap_or_default());
        token.value_offset = token.value_offset.saturating_add(inner_start);
        tracing::trace!(kind = ?token.kind, value = %token.value, "classified tag");
        tokens.push(token);
        pos = inner_start
            .saturating_add(close)
            .saturating_add(CLOSE_DELIMITER.len());
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_values(input: &str) -> Vec<(MarkupKind, String)> {
        tokenize_markup(input)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_plain_text() {
        assert_eq!(
            kinds_and_values("hello world"),
            vec![(MarkupKind::Text, "hello world".to_string())]
        );
        assert!(tokenize_markup("").unwrap().is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_variable_between_text() {
        assert_eq!(
            kinds_and_values("Hello {{ name }}!"),
            vec![
                (MarkupKind::Text, "Hello ".to_string()),
                (MarkupKind::Variable, "name".to_string()),
                (MarkupKind::Text, "!".to_string()),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_keywords() {
        let cases = [
            ("if a > 1", MarkupKind::If, "a > 1"),
            ("elsif b", MarkupKind::Elsif, "b"),
            ("else if c", MarkupKind::Elsif, "c"),
            ("else", MarkupKind::Else, ""),
            ("unless done", MarkupKind::Unless, "done"),
            ("for i, x in xs", MarkupKind::For, "i, x in xs"),
            ("end", MarkupKind::End, ""),
            ("include \"footer\"", MarkupKind::Include, "\"footer\""),
            ("pageBreak", MarkupKind::PageBreak, ""),
            ("if(x)", MarkupKind::If, "(x)"),
        ];
        for (inner, kind, value) in cases {
            let token = classify(inner);
            assert_eq!(token.kind, kind, "{}", inner);
            assert_eq!(token.value, value, "{}", inner);
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_keyword_prefixes_are_variables() {
        for inner in ["ifActive", "endDate", "format(x)", "forecast", "elsewhere", "included"] {
            let token = classify(inner);
            assert_eq!(token.kind, MarkupKind::Variable, "{}", inner);
            assert_eq!(token.value, inner);
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_value_offsets_point_into_source() {
        let source = "ab{{  if  x > 1 }}cd";
        let tokens = tokenize_markup(source).unwrap();
        let tag = &tokens[1];
        assert_eq!(tag.kind, MarkupKind::If);
        assert_eq!(
            &source[tag.value_offset..tag.value_offset + tag.value.len()],
            "x > 1"
        );
        assert_eq!(tokens[2].value_offset, 18);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unclosed_tag() {
        let err = tokenize_markup("text {{ name").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnclosedTag);
        assert_eq!(err.position, 5);

        let err = tokenize_markup("{{a {{b}}").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_multibyte_text_around_tags() {
        let tokens = tokenize_markup("\u{e9}{{x}}\u{fc}").unwrap();
        let summary: Vec<(MarkupKind, &str, usize)> = tokens
            .iter()
            .map(|t| (t.kind, t.value.as_str(), t.value_offset))
            .collect();
        assert_eq!(
            summary,
            vec![
                (MarkupKind::Text, "\u{e9}", 0),
                (MarkupKind::Variable, "x", 4),
                (MarkupKind::Text, "\u{fc}", 7),
            ]
        );

        let err = tokenize_markup("\u{fc}{{").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnclosedTag);
        assert_eq!(err.position, 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_stray_closer_is_text() {
        assert_eq!(
            kinds_and_values("a }} b"),
            vec![(MarkupKind::Text, "a }} b".to_string())]
        );
    }
}
