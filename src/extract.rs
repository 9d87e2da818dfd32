//! Text extraction and normalization.
//!
//! Plain text and markdown are decoded directly from the walker's bytes.
//! Word-processor formats go through a [`DocumentConverter`], an injected
//! capability the pipeline only knows by its contract. [`OfficeConverter`] is
//! the stock implementation: `.docx` is unpacked in-process, legacy `.doc`
//! is handed to an optional external command.
//!
//! Failures never escape [`TextExtractor::extract`]: the document comes back
//! with empty text and the error string, and the batch carries on.

use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::models::{ParsedDocument, SourceDocument};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: .{0}")]
    Unsupported(String),
    #[error("read failed: {0}")]
    Io(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("converter command failed: {0}")]
    Command(String),
}

/// Converts a rich document on disk into plain text.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Default converter: built-in `.docx`, external command for `.doc`.
#[derive(Debug, Clone, Default)]
pub struct OfficeConverter {
    doc_command: Option<Vec<String>>,
}

impl OfficeConverter {
    pub fn new(doc_command: Option<Vec<String>>) -> Self {
        Self { doc_command }
    }

    async fn run_doc_command(&self, path: &Path) -> Result<String, ExtractError> {
        let cmd = match self.doc_command.as_deref() {
            Some(cmd) if !cmd.is_empty() => cmd,
            _ => return Err(ExtractError::Unsupported("doc".to_string())),
        };
        let path_str = path.to_string_lossy();
        let args: Vec<String> = cmd[1..]
            .iter()
            .map(|a| a.replace("{path}", &path_str))
            .collect();

        let output = tokio::process::Command::new(&cmd[0])
            .args(&args)
            .output()
            .await
            .map_err(|e| ExtractError::Command(format!("{}: {}", cmd[0], e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Command(format!(
                "{} exited with {}: {}",
                cmd[0],
                output.status,
                stderr.trim()
            )));
        }
        Ok(decode_text(&output.stdout))
    }
}

#[async_trait]
impl DocumentConverter for OfficeConverter {
    async fn convert(&self, path: &Path) -> Result<String, ExtractError> {
        match extension_of(path).as_str() {
            "docx" => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ExtractError::Io(e.to_string()))?;
                extract_docx(&bytes)
            }
            "doc" => self.run_doc_command(path).await,
            other => Err(ExtractError::Unsupported(other.to_string())),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Turns [`SourceDocument`]s into [`ParsedDocument`]s.
pub struct TextExtractor {
    converter: Box<dyn DocumentConverter>,
}

impl TextExtractor {
    pub fn new(converter: Box<dyn DocumentConverter>) -> Self {
        Self { converter }
    }

    pub async fn extract(&self, source: SourceDocument) -> ParsedDocument {
        let raw = match source.extension.as_str() {
            "txt" | "md" => Ok(decode_text(&source.bytes)),
            "doc" | "docx" => self.converter.convert(&source.path).await,
            other => Err(ExtractError::Unsupported(other.to_string())),
        };

        let (text, error) = match raw {
            Ok(raw) => (normalize_text(&raw), None),
            Err(e) => {
                tracing::warn!(path = %source.rel_path, error = %e, "extraction failed");
                (String::new(), Some(e.to_string()))
            }
        };
        let lines = content_lines(&text);

        ParsedDocument {
            source,
            text,
            lines,
            error,
        }
    }
}

/// Decode bytes as UTF-8, dropping a BOM and replacing invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn is_nbsp(c: char) -> bool {
    matches!(c, '\u{00A0}' | '\u{202F}' | '\u{2007}' | '\u{FEFF}')
}

/// Normalize newlines to `\n`, fold non-breaking spaces into plain spaces,
/// strip trailing whitespace per line and trim the whole body.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut prev_nbsp = false;
        for c in line.chars() {
            if is_nbsp(c) {
                if !prev_nbsp {
                    out.push(' ');
                }
                prev_nbsp = true;
            } else {
                out.push(c);
                prev_nbsp = false;
            }
        }
        let trimmed_len = out.trim_end_matches([' ', '\t']).len();
        out.truncate(trimmed_len);
    }
    out.trim().to_string()
}

/// Non-empty lines of `text` with internal whitespace collapsed.
pub fn content_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

const TITLE_MAX_CHARS: usize = 40;

fn is_title_prefix(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(c, '-' | '_' | '.' | '年' | '月' | '日' | '号')
}

/// Title taken from the file name: the stem minus any leading code or date.
pub fn fallback_title(stem: &str) -> String {
    let rest = stem.trim_start_matches(is_title_prefix).trim();
    if rest.is_empty() {
        stem.trim().to_string()
    } else {
        rest.to_string()
    }
}

/// A markdown heading on the first line wins, then the file-name title,
/// then the first line itself.
pub fn derive_title(lines: &[String], fallback: &str) -> String {
    let first = lines.first().map(String::as_str).unwrap_or("");
    let heading = first.strip_prefix('#').map(|h| h.trim_start_matches('#').trim());
    let chosen = match heading {
        Some(h) if !h.is_empty() => h,
        _ if !fallback.is_empty() => fallback,
        _ if !first.is_empty() => first,
        _ => "untitled",
    };
    chosen.chars().take(TITLE_MAX_CHARS).collect()
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name(DOCX_BODY)
        .map_err(|_| ExtractError::Ooxml(format!("{} not found", DOCX_BODY)))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "{} exceeds size limit ({} bytes)",
            DOCX_BODY, MAX_XML_ENTRY_BYTES
        )));
    }
    extract_paragraphs(&xml)
}

/// Collect `<w:t>` text, one output line per `<w:p>`.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
