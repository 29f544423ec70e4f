use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use zip::ZipArchive;

use crate::error::{DocxlateError, DocxlateResult};
use crate::interface::PartSource;

pub const DOCUMENT_PART: &str = "word/document.xml";

const WORDML_NAMESPACES: [&[u8]; 2] = [
    b"http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    b"http://purl.oclc.org/ooxml/wordprocessingml/main",
];

const MARKUP_COMPATIBILITY_NAMESPACE: &[u8] =
    b"http://schemas.openxmlformats.org/markup-compatibility/2006";

/// The parts of a `.docx` package, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Reads every file entry of the zip archive in `bytes`.
    ///
    /// # Errors
    /// - `DocxlateError::Package` if the bytes are not a zip archive, an entry
    ///   cannot be read, or there is no `word/document.xml`.
    pub fn from_bytes(bytes: &[u8]) -> DocxlateResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut content)
                .map_err(|e| DocxlateError::Package {
                    message: format!("failed to read {}: {}", name, e),
                })?;
            parts.insert(name, content);
        }

        if !parts.contains_key(DOCUMENT_PART) {
            return Err(DocxlateError::Package {
                message: format!("not a word document: {} is missing", DOCUMENT_PART),
            });
        }
        tracing::debug!(parts = parts.len(), "opened package");
        Ok(Self { parts })
    }
}

impl PartSource for Package {
    fn list_parts(&self) -> Vec<String> {
        self.parts.keys().cloned().collect()
    }

    fn get_part(&self, name: &str) -> DocxlateResult<Vec<u8>> {
        self.parts
            .get(name)
            .cloned()
            .ok_or_else(|| DocxlateError::Package {
                message: format!("missing part {}", name),
            })
    }
}

/// The number in `word/header3.xml`, or 0 for an unnumbered `word/header.xml`.
fn numbered_part(name: &str, stem: &str) -> Option<u32> {
    let digits = name.strip_prefix(stem)?.strip_suffix(".xml")?;
    if digits.is_empty() {
        Some(0)
    } else if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Picks the parts that may hold template text, in scan order: the main
/// document, then headers, then footers, each group by numeric suffix.
pub fn template_parts(names: &[String]) -> Vec<String> {
    let mut ordered = Vec::new();
    if names.iter().any(|name| name == DOCUMENT_PART) {
        ordered.push(DOCUMENT_PART.to_string());
    }
    for stem in ["word/header", "word/footer"] {
        let mut numbered: Vec<(u32, &String)> = names
            .iter()
            .filter_map(|name| numbered_part(name, stem).map(|n| (n, name)))
            .collect();
        numbered.sort();
        ordered.extend(numbered.into_iter().map(|(_, name)| name.clone()));
    }
    ordered
}

/// A run's position within its paragraph and the text it contributes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub index: usize,
    pub text: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paragraph {
    /// Position of the paragraph's opening tag among all paragraphs of its part.
    pub index: usize,
    /// Runs in document order, including runs wrapped in hyperlinks, fields
    /// and revision marks.
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

enum Element {
    Paragraph,
    Run,
    Text,
    Tab,
    Break,
    /// `mc:Fallback`, a legacy copy of the preceding `mc:Choice` content.
    Fallback,
    Other,
}

fn classify_element(resolved: &ResolveResult<'_>, local_name: &[u8]) -> Element {
    let ResolveResult::Bound(Namespace(namespace)) = resolved else {
        return Element::Other;
    };
    if *namespace == MARKUP_COMPATIBILITY_NAMESPACE && local_name == b"Fallback" {
        return Element::Fallback;
    }
    if !WORDML_NAMESPACES.iter().any(|known| known == namespace) {
        return Element::Other;
    }
    match local_name {
        b"p" => Element::Paragraph,
        b"r" => Element::Run,
        b"t" => Element::Text,
        b"tab" => Element::Tab,
        b"br" | b"cr" => Element::Break,
        _ => Element::Other,
    }
}

struct OpenParagraph {
    paragraph: Paragraph,
    run_open: bool,
}

#[derive(Default)]
struct ParagraphCollector {
    open: Vec<OpenParagraph>,
    done: Vec<Paragraph>,
    next_index: usize,
    in_text: bool,
}

impl ParagraphCollector {
    fn open_paragraph(&mut self) {
        self.open.push(OpenParagraph {
            paragraph: Paragraph {
                index: self.next_index,
                runs: Vec::new(),
            },
            run_open: false,
        });
        self.next_index = self.next_index.saturating_add(1);
    }

    fn close_paragraph(&mut self) {
        if let Some(open) = self.open.pop() {
            self.done.push(open.paragraph);
        }
    }

    fn open_run(&mut self) {
        if let Some(open) = self.open.last_mut() {
            let index = open.paragraph.runs.len();
            open.paragraph.runs.push(Run {
                index,
                text: String::new(),
            });
            open.run_open = true;
        }
    }

    fn close_run(&mut self) {
        if let Some(open) = self.open.last_mut() {
            open.run_open = false;
        }
    }

    /// Appends to the innermost paragraph's open run. Text outside a run
    /// (e.g. a `w:tab` stop definition) is ignored.
    fn push_text(&mut self, text: &str) {
        let Some(open) = self.open.last_mut() else {
            return;
        };
        if open.run_open {
            if let Some(run) = open.paragraph.runs.last_mut() {
                run.text.push_str(text);
            }
        }
    }

    fn finish(mut self) -> Vec<Paragraph> {
        while !self.open.is_empty() {
            self.close_paragraph();
        }
        self.done.sort_by_key(|paragraph| paragraph.index);
        self.done
    }
}

/// Extracts the paragraphs of one WordprocessingML part.
///
/// Paragraphs nested in text boxes are returned as paragraphs of their own.
/// Of an `mc:AlternateContent` block only the chosen content is read.
///
/// # Errors
/// - `DocxlateError::Xml` if the part is not well-formed UTF-8 XML.
pub fn paragraphs(part: &str, xml: &[u8]) -> DocxlateResult<Vec<Paragraph>> {
    let xml_error = |message: String| DocxlateError::Xml {
        part: part.to_string(),
        message,
    };

    let source = std::str::from_utf8(xml).map_err(|e| xml_error(e.to_string()))?;
    let mut reader = NsReader::from_str(source);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut collector = ParagraphCollector::default();
    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| xml_error(e.to_string()))?;
        match event {
            Event::Start(e) => match classify_element(&resolved, e.local_name().as_ref()) {
                Element::Paragraph => collector.open_paragraph(),
                Element::Run => collector.open_run(),
                Element::Text => collector.in_text = true,
                Element::Tab => collector.push_text("\t"),
                Element::Break => collector.push_text("\n"),
                Element::Fallback => {
                    reader
                        .read_to_end(e.name())
                        .map_err(|e| xml_error(e.to_string()))?;
                }
                Element::Other => {}
            },
            Event::Empty(e) => match classify_element(&resolved, e.local_name().as_ref()) {
                Element::Paragraph => {
                    collector.open_paragraph();
                    collector.close_paragraph();
                }
                Element::Run => {
                    collector.open_run();
                    collector.close_run();
                }
                Element::Tab => collector.push_text("\t"),
                Element::Break => collector.push_text("\n"),
                Element::Text | Element::Fallback | Element::Other => {}
            },
            Event::End(e) => match classify_element(&resolved, e.local_name().as_ref()) {
                Element::Paragraph => collector.close_paragraph(),
                Element::Run => collector.close_run(),
                Element::Text => collector.in_text = false,
                Element::Tab | Element::Break | Element::Fallback | Element::Other => {}
            },
            Event::Text(e) if collector.in_text => {
                let text = e.unescape().map_err(|e| xml_error(e.to_string()))?;
                collector.push_text(&text);
            }
            Event::CData(e) if collector.in_text => {
                collector.push_text(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Eof => break,
            Event::Text(_)
            | Event::CData(_)
            | Event::Comment(_)
            | Event::Decl(_)
            | Event::PI(_)
            | Event::DocType(_) => {}
        }
    }

    let paragraphs = collector.finish();
    tracing::debug!(part, paragraphs = paragraphs.len(), "extracted paragraphs");
    Ok(paragraphs)
}

/// The text of a package's main document, one line per paragraph.
///
/// # Errors
/// - Any error of [`Package::from_bytes`] or [`paragraphs`].
pub fn body_text(bytes: &[u8]) -> DocxlateResult<String> {
    let package = Package::from_bytes(bytes)?;
    let xml = package.get_part(DOCUMENT_PART)?;
    let lines: Vec<String> = paragraphs(DOCUMENT_PART, &xml)?
        .iter()
        .map(Paragraph::text)
        .collect();
    Ok(lines.join("\n"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// Wraps paragraph markup in a minimal `w:document`.
    pub(crate) fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#
        )
    }

    /// A paragraph with one run per entry of `runs`.
    pub(crate) fn paragraph(runs: &[&str]) -> String {
        let runs: String = runs
            .iter()
            .map(|text| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, text))
            .collect();
        format!("<w:p>{}</w:p>", runs)
    }

    pub(crate) fn package(parts: &[(&str, String)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// A package whose main document holds `paragraphs`, each a list of run
    /// texts.
    pub(crate) fn docx(paragraphs: &[&[&str]]) -> Vec<u8> {
        let body: String = paragraphs.iter().map(|runs| paragraph(runs)).collect();
        package(&[("word/document.xml", document_xml(&body))])
    }
}
