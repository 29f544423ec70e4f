use std::fmt;

use crate::error::{LexError, LexErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    And,
    Or,
    Bang,
    /// A single `=`, read as equality by the parser.
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{}'", name),
            Self::Int(i) => write!(f, "number {}", i),
            Self::Float(x) => write!(f, "number {}", x),
            Self::Str(s) => write!(f, "string {:?}", s),
            Self::Eof => f.write_str("end of input"),
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Plus
            | Self::Minus
            | Self::Star
            | Self::Slash
            | Self::Percent
            | Self::And
            | Self::Or
            | Self::Bang
            | Self::Assign
            | Self::LParen
            | Self::RParen
            | Self::LBracket
            | Self::RBracket
            | Self::Comma
            | Self::Dot => write!(f, "'{}'", self.symbol()),
        }
    }
}

impl TokenKind {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Bang => "!",
            Self::Assign => "=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Ident(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) | Self::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character.
    pub position: usize,
}

/// Opening quote to closing quote. Word processors substitute typographic
/// quotes for the ASCII ones as the author types.
const QUOTE_PAIRS: [(char, char); 6] = [
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'), // “ ”
    ('\u{2018}', '\u{2019}'), // ‘ ’
    ('\u{201E}', '\u{201C}'), // „ “
    ('\u{00AB}', '\u{00BB}'), // « »
];

fn closing_quote(open: char) -> Option<char> {
    QUOTE_PAIRS
        .iter()
        .find(|(o, _)| *o == open)
        .map(|(_, close)| *close)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Byte offset just past the last pushed token.
    prev_end: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            prev_end: 0,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self, c: char) {
        self.pos = self.pos.saturating_add(c.len_utf8());
    }

    fn slice_from(&self, start: usize) -> &'a str {
        self.input.get(start..self.pos).unwrap_or_default()
    }

    fn push(&mut self, kind: TokenKind, position: usize) {
        self.tokens.push(Token { kind, position });
        self.prev_end = self.pos;
    }

    /// A `.` starts a decimal when a digit follows, unless it directly
    /// touches an operand and so reads as a field access (`items.0`, `f(x).1`).
    fn dot_starts_number(&self) -> bool {
        let digit_follows = self.peek_second().is_some_and(|c| c.is_ascii_digit());
        let touches_operand = self.prev_end == self.pos
            && matches!(
                self.tokens.last().map(|t| &t.kind),
                Some(
                    TokenKind::Ident(_)
                        | TokenKind::RParen
                        | TokenKind::RBracket
                        | TokenKind::Int(_)
                        | TokenKind::Float(_)
                        | TokenKind::Str(_)
                )
            );
        digit_follows && !touches_operand
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance(c);
            } else if c == '.'
                && !seen_dot
                && self.peek_second().is_some_and(|n| n.is_ascii_digit())
            {
                seen_dot = true;
                self.advance(c);
            } else {
                break;
            }
        }

        let text = self.slice_from(start);
        let kind = match text.parse::<i64>() {
            Ok(i) if !seen_dot => TokenKind::Int(i),
            // Decimals, and integers too large for i64.
            Ok(_) | Err(_) => match text.parse::<f64>() {
                Ok(x) if x.is_finite() => TokenKind::Float(x),
                Ok(_) | Err(_) => {
                    return Err(LexError::new(
                        start,
                        LexErrorKind::NumberOutOfRange(text.to_string()),
                    ));
                }
            },
        };
        self.push(kind, start);
        Ok(())
    }

    fn lex_identifier(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance(c);
            } else {
                break;
            }
        }
        let name = self.slice_from(start).to_string();
        self.push(TokenKind::Ident(name), start);
    }

    fn lex_string(&mut self, open: char, close: char) -> Result<(), LexError> {
        let start = self.pos;
        let unterminated = || LexError::new(start, LexErrorKind::UnterminatedString(open));
        self.advance(open);
        let mut value = String::new();
        loop {
            let c = self.peek_char().ok_or_else(unterminated)?;
            self.advance(c);
            if c == '\\' {
                let escaped = self.peek_char().ok_or_else(unterminated)?;
                self.advance(escaped);
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            } else if c == close {
                break;
            } else {
                value.push(c);
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn lex_operator(&mut self, c: char) -> Result<(), LexError> {
        let start = self.pos;
        let next = self.peek_second();
        let (kind, doubled) = match (c, next) {
            ('=', Some('=')) => (TokenKind::Eq, true),
            ('!', Some('=')) => (TokenKind::NotEq, true),
            ('<', Some('=')) => (TokenKind::LtEq, true),
            ('>', Some('=')) => (TokenKind::GtEq, true),
            ('&', Some('&')) => (TokenKind::And, true),
            ('|', Some('|')) => (TokenKind::Or, true),
            ('=', _) => (TokenKind::Assign, false),
            ('!', _) => (TokenKind::Bang, false),
            ('<', _) => (TokenKind::Lt, false),
            ('>', _) => (TokenKind::Gt, false),
            ('&', _) => (TokenKind::And, false),
            ('|', _) => (TokenKind::Or, false),
            ('+', _) => (TokenKind::Plus, false),
            ('-', _) => (TokenKind::Minus, false),
            ('*', _) => (TokenKind::Star, false),
            ('/', _) => (TokenKind::Slash, false),
            ('%', _) => (TokenKind::Percent, false),
            ('(', _) => (TokenKind::LParen, false),
            (')', _) => (TokenKind::RParen, false),
            ('[', _) => (TokenKind::LBracket, false),
            (']', _) => (TokenKind::RBracket, false),
            (',', _) => (TokenKind::Comma, false),
            ('.', _) => (TokenKind::Dot, false),
            _ => {
                return Err(LexError::new(start, LexErrorKind::UnexpectedCharacter(c)));
            }
        };
        self.advance(c);
        if let (true, Some(second)) = (doubled, next) {
            self.advance(second);
        }
        self.push(kind, start);
        Ok(())
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance(c);
            } else if c.is_ascii_digit() || (c == '.' && self.dot_starts_number()) {
                self.lex_number()?;
            } else if c.is_alphabetic() || c == '_' {
                self.lex_identifier();
            } else if let Some(close) = closing_quote(c) {
                self.lex_string(c, close)?;
            } else {
                self.lex_operator(c)?;
            }
        }
        self.pos = self.input.len();
        self.push(TokenKind::Eof, self.pos);
        Ok(self.tokens)
    }
}

/// Splits an expression into tokens, always ending with [`TokenKind::Eof`].
///
/// # Errors
/// - On a character that cannot start any token, an unterminated string, or
///   a number literal too large for a finite float.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_identifiers_and_field_access() {
        assert_eq!(
            kinds("user.name"),
            vec![ident("user"), TokenKind::Dot, ident("name"), TokenKind::Eof]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_numbers() {
        assert_eq!(
            kinds("12 3.25 .5"),
            vec![
                TokenKind::Int(12),
                TokenKind::Float(3.25),
                TokenKind::Float(0.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_dot_after_identifier_is_field_access() {
        assert_eq!(
            kinds("items.0"),
            vec![ident("items"), TokenKind::Dot, TokenKind::Int(0), TokenKind::Eof]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_number_followed_by_dot_identifier() {
        assert_eq!(
            kinds("1.x"),
            vec![TokenKind::Int(1), TokenKind::Dot, ident("x"), TokenKind::Eof]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_spaced_dot_starts_decimal() {
        assert_eq!(
            kinds("f(1) .5"),
            vec![
                ident("f"),
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::RParen,
                TokenKind::Float(0.5),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("3 .5"),
            vec![TokenKind::Int(3), TokenKind::Float(0.5), TokenKind::Eof]
        );
        assert_eq!(
            kinds("f(x).1"),
            vec![
                ident("f"),
                TokenKind::LParen,
                ident("x"),
                TokenKind::RParen,
                TokenKind::Dot,
                TokenKind::Int(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_large_integers_become_floats() {
        assert_eq!(
            kinds("99999999999999999999"),
            vec![TokenKind::Float(1e20), TokenKind::Eof]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_number_out_of_range() {
        let digits = "9".repeat(400);
        let err = tokenize(&format!("x + {}", digits)).unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.kind, LexErrorKind::NumberOutOfRange(digits));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_strings_with_escapes() {
        assert_eq!(
            kinds(r#""a\"b" 'it\'s'"#),
            vec![
                TokenKind::Str("a\"b".to_string()),
                TokenKind::Str("it's".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_typographic_quotes() {
        assert_eq!(
            kinds("“hello” ‘x’ „unten“ «guillemets»"),
            vec![
                TokenKind::Str("hello".to_string()),
                TokenKind::Str("x".to_string()),
                TokenKind::Str("unten".to_string()),
                TokenKind::Str("guillemets".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= + - * / % & | ! < > = && ||"),
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Bang,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_positions_are_byte_offsets() {
        let tokens = tokenize("“é” + x").unwrap();
        assert_eq!(tokens[0].position, 0);
        // “ is three bytes, é two, ” three, then a space.
        assert_eq!(tokens[1].position, 9);
        assert_eq!(tokens[2].position, 11);
        assert_eq!(tokens[3].position, 12);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unrecognized_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err, LexError::new(2, LexErrorKind::UnexpectedCharacter('#')));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err, LexError::new(0, LexErrorKind::UnterminatedString('"')));
    }
}
