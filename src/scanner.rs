//! Locates `{{...}}` tokens in document paragraphs.
//!
//! Word processors split text into runs wherever formatting, spell checking or
//! editing history changes, so a single token is often spread over several
//! runs or wrapped in a hyperlink. The scanner joins each paragraph's runs
//! into one character stream, remembering for every character the run it came
//! from and its UTF-16 offset, and finds delimiters in that stream.

use sha2::{Digest, Sha256};

use crate::docx::{Paragraph, paragraphs, template_parts};
use crate::error::DocxlateResult;
use crate::interface::PartSource;
use crate::markup::{MarkupToken, classify};

/// A located `{{...}}` occurrence.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub part: String,
    pub paragraph_index: usize,
    /// Run holding the opening `{{`.
    pub run_index: usize,
    /// UTF-16 offset of the opening `{{` within the paragraph.
    pub char_start_utf16: usize,
    /// UTF-16 offset just past the closing `}}`, or past the last character
    /// of a malformed span.
    pub char_end_utf16: usize,
    pub raw: String,
    /// Text between the delimiters, trimmed.
    pub inner_expression: String,
    /// Position of this span among all spans of the document.
    pub token_ordinal: usize,
    pub anchor_id: String,
    pub malformed: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub message: Option<String>,
    /// Classification of the inner text; `None` for malformed spans.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub token: Option<MarkupToken>,
}

/// Derives a stable identifier from where a token is and what it says.
pub fn anchor_id(part: &str, paragraph_index: usize, start: usize, end: usize, raw: &str) -> String {
    let key = format!("{part}\x1f{paragraph_index}\x1f{start}\x1f{end}\x1f{raw}");
    Sha256::digest(key.as_bytes())
        .iter()
        .take(8)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

struct Located {
    ch: char,
    run_index: usize,
    utf16_offset: usize,
}

/// Flattens a paragraph's runs into characters tagged with their run index
/// and UTF-16 offset.
fn flatten(paragraph: &Paragraph) -> (Vec<Located>, usize) {
    let mut chars = Vec::new();
    let mut offset = 0;
    for run in &paragraph.runs {
        for ch in run.text.chars() {
            chars.push(Located {
                ch,
                run_index: run.index,
                utf16_offset: offset,
            });
            offset = offset.saturating_add(ch.len_utf16());
        }
    }
    (chars, offset)
}

fn is_pair(chars: &[Located], at: usize, delimiter: char) -> bool {
    chars.get(at).is_some_and(|c| c.ch == delimiter)
        && chars
            .get(at.saturating_add(1))
            .is_some_and(|c| c.ch == delimiter)
}

/// Collects token spans across paragraphs, numbering them in the order they
/// are found.
#[derive(Debug, Default)]
pub struct Scanner {
    spans: Vec<TokenSpan>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every template-bearing part of `source` in order.
    ///
    /// # Errors
    /// - If a part cannot be read or is not well-formed XML.
    pub fn scan_parts(&mut self, source: &dyn PartSource) -> DocxlateResult<()> {
        for part in template_parts(&source.list_parts()) {
            let xml = source.get_part(&part)?;
            let before = self.spans.len();
            for paragraph in paragraphs(&part, &xml)? {
                self.scan_paragraph(&part, &paragraph);
            }
            let tokens = self.spans.len().saturating_sub(before);
            tracing::debug!(part = %part, tokens, "scanned part");
        }
        Ok(())
    }

    pub fn scan_paragraph(&mut self, part: &str, paragraph: &Paragraph) {
        let (chars, total_utf16) = flatten(paragraph);
        let end_offset = |index: usize| chars.get(index).map_or(total_utf16, |c| c.utf16_offset);
        let text = |from: usize, to: usize| -> String {
            chars
                .get(from..to)
                .unwrap_or_default()
                .iter()
                .map(|c| c.ch)
                .collect()
        };

        let mut i = 0;
        while let Some(first) = chars.get(i) {
            if !is_pair(&chars, i, '{') {
                i = i.saturating_add(1);
                continue;
            }

            let start = i;
            let inner_start = start.saturating_add(2);
            let mut j = inner_start;
            let mut close = None;
            let mut reopen = None;
            while j < chars.len() {
                if is_pair(&chars, j, '}') {
                    close = Some(j);
                    break;
                }
                if is_pair(&chars, j, '{') {
                    reopen = Some(j);
                    break;
                }
                j = j.saturating_add(1);
            }

            let (stop, inner, message) = match (close, reopen) {
                (Some(close), _) => (close.saturating_add(2), text(inner_start, close), None),
                (None, Some(reopen)) => (
                    reopen,
                    text(inner_start, reopen),
                    Some("'{{' is not closed before the next '{{'".to_string()),
                ),
                (None, None) => (
                    chars.len(),
                    text(inner_start, chars.len()),
                    Some("'{{' is not closed before the end of the paragraph".to_string()),
                ),
            };

            self.push(
                part,
                paragraph.index,
                first,
                end_offset(stop),
                text(start, stop),
                inner,
                message,
            );
            i = stop;
        }
    }

    fn push(
        &mut self,
        part: &str,
        paragraph_index: usize,
        first: &Located,
        char_end_utf16: usize,
        raw: String,
        inner: String,
        message: Option<String>,
    ) {
        let malformed = message.is_some();
        let token = (!malformed).then(|| classify(&inner));
        let span = TokenSpan {
            part: part.to_string(),
            paragraph_index,
            run_index: first.run_index,
            char_start_utf16: first.utf16_offset,
            char_end_utf16,
            anchor_id: anchor_id(part, paragraph_index, first.utf16_offset, char_end_utf16, &raw),
            inner_expression: inner.trim().to_string(),
            raw,
            token_ordinal: self.spans.len(),
            malformed,
            message,
            token,
        };
        tracing::trace!(ordinal = span.token_ordinal, raw = %span.raw, malformed, "found token");
        self.spans.push(span);
    }

    pub fn finish(self) -> Vec<TokenSpan> {
        self.spans
    }
}

/// Scans a whole document: the main body, then headers, then footers.
///
/// # Errors
/// - If a part cannot be read or is not well-formed XML.
pub fn scan_document(source: &dyn PartSource) -> DocxlateResult<Vec<TokenSpan>> {
    let mut scanner = Scanner::new();
    scanner.scan_parts(source)?;
    Ok(scanner.finish())
}
