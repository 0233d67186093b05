//! Process narrative input
//!
//! Narratives come from a text file, a Word document or text typed by the
//! user. File input also names the document: `acme_invoice-intake.txt`
//! becomes "Acme Invoice Intake".

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{PddError, Result};

/// Title used when the narrative was not read from a file
pub const DEFAULT_TITLE: &str = "UiPath Automation - Process Overview";

/// Extensions accepted as plain text
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "text"];

/// Main body part of a WordprocessingML package
const DOCX_BODY: &str = "word/document.xml";

/// File-name characters read as spaces in titles
static TITLE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_-]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeSource {
    File(PathBuf),
    Manual,
}

#[derive(Debug, Clone)]
pub struct Narrative {
    pub title: String,
    pub text: String,
    pub source: NarrativeSource,
}

impl Narrative {
    /// Narrative typed by the user
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PddError::EmptyNarrative);
        }
        Ok(Self {
            title: DEFAULT_TITLE.to_string(),
            text,
            source: NarrativeSource::Manual,
        })
    }

    /// Narrative read from a UTF-8 text file or a `.docx` document
    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let text = if extension == "docx" {
            read_docx(path)?
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            let bytes = std::fs::read(path)?;
            String::from_utf8(bytes).map_err(|_| PddError::InvalidEncoding {
                path: path.display().to_string(),
            })?
        } else {
            return Err(PddError::UnsupportedInput {
                path: path.display().to_string(),
            });
        };

        if text.trim().is_empty() {
            return Err(PddError::EmptyNarrative);
        }

        Ok(Self {
            title: title_from_filename(path),
            text,
            source: NarrativeSource::File(path.to_path_buf()),
        })
    }

    /// At most `max_chars` characters of the text
    pub fn truncated(&self, max_chars: usize) -> &str {
        truncate_chars(&self.text, max_chars)
    }
}

/// Cut `text` to `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Document title from a file name: extension dropped, each `_`/`-`
/// replaced by a space, then title-cased.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let title = title_case(&TITLE_SEPARATORS.replace_all(&stem, " "));

    if title.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// Upper-case every letter that follows a non-letter, lower-case the rest
/// (`my.process.v2` → `My.Process.V2`).
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = cased;
    }
    out
}

// ============================================================================
// WORD DOCUMENTS
// ============================================================================

/// Paragraph text of a `.docx` file, one line per paragraph
fn read_docx(path: &Path) -> Result<String> {
    let invalid = |reason: String| PddError::InvalidDocument {
        path: path.display().to_string(),
        reason,
    };

    let mut archive = zip::ZipArchive::new(File::open(path)?).map_err(|e| invalid(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| invalid(format!("{DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| invalid(format!("{DOCX_BODY}: {e}")))?;

    docx_paragraphs(&xml).map_err(invalid)
}

/// Join the `<w:t>` runs of each `<w:p>`; paragraphs are separated by `\n`
fn docx_paragraphs(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = in_run,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if in_run => current.push('\t'),
                b"br" | b"cr" if in_run => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
