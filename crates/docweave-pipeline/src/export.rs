//! Export - turns a task's plain-text output into a Word document.
//!
//! Formatting is a line classifier, nothing more:
//!
//! | trimmed line        | block             |
//! |---------------------|-------------------|
//! | `# X`               | heading 1 `X`     |
//! | `## X`              | heading 2 `X`     |
//! | `- X` / `* X`       | bullet `X`        |
//! | `**X**:`            | heading 3 `X`     |
//! | blank               | dropped           |
//! | anything else       | paragraph         |
//!
//! `format_document` is pure; rendering to `.docx` happens in `to_docx`.

use crate::resource::ResourceDriver;
use docweave_core::{Error, Result};
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

const BULLET_NUMBERING_ID: usize = 2;

/// One formatted block of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Bullet(String),
    Paragraph(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub blocks: Vec<Block>,
}

/// Classify one line. `None` for blank lines.
pub fn classify_line(line: &str) -> Option<Block> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let block = if let Some(rest) = line.strip_prefix("# ") {
        Block::Heading { level: 1, text: rest.trim().to_string() }
    } else if let Some(rest) = line.strip_prefix("## ") {
        Block::Heading { level: 2, text: rest.trim().to_string() }
    } else if let Some(rest) = line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
        Block::Bullet(rest.to_string())
    } else if line.starts_with("**") && line.ends_with("**:") {
        let text = line.trim_matches(|c: char| c == '*' || c == ':');
        Block::Heading { level: 3, text: text.to_string() }
    } else {
        Block::Paragraph(line.to_string())
    };
    Some(block)
}

pub fn format_document(title: &str, text: &str) -> Document {
    Document {
        title: title.to_string(),
        blocks: text.lines().filter_map(classify_line).collect(),
    }
}

impl Document {
    pub fn to_docx(&self) -> Docx {
        let bullet_level = Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        );
        let mut docx = Docx::new()
            .add_style(Style::new("Title", StyleType::Paragraph).name("Title").size(52).bold())
            .add_style(Style::new("Heading1", StyleType::Paragraph).name("Heading 1").size(32).bold())
            .add_style(Style::new("Heading2", StyleType::Paragraph).name("Heading 2").size(28).bold())
            .add_style(Style::new("Heading3", StyleType::Paragraph).name("Heading 3").size(24).bold())
            .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING_ID).add_level(bullet_level))
            .add_numbering(Numbering::new(BULLET_NUMBERING_ID, BULLET_NUMBERING_ID))
            .add_paragraph(text_paragraph(&self.title).style("Title"));

        for block in &self.blocks {
            let paragraph = match block {
                Block::Heading { level, text } => {
                    text_paragraph(text).style(&format!("Heading{}", level))
                }
                Block::Bullet(text) => text_paragraph(text).numbering(
                    NumberingId::new(BULLET_NUMBERING_ID),
                    IndentLevel::new(0),
                ),
                Block::Paragraph(text) => text_paragraph(text),
            };
            docx = docx.add_paragraph(paragraph);
        }
        docx
    }

    /// Packed `.docx` bytes.
    pub fn to_docx_bytes(&self) -> std::result::Result<Vec<u8>, String> {
        let mut buf = Cursor::new(Vec::new());
        self.to_docx()
            .build()
            .pack(&mut buf)
            .map_err(|e| e.to_string())?;
        Ok(buf.into_inner())
    }
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

/// One post-processing step: read a task's sink, write a document.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSpec {
    pub source: PathBuf,
    pub document: PathBuf,
    pub title: String,
}

impl ExportSpec {
    pub fn new(source: &str, document: &str, title: &str) -> Self {
        Self {
            source: PathBuf::from(source),
            document: PathBuf::from(document),
            title: title.into(),
        }
    }
}

pub async fn export_document(driver: &dyn ResourceDriver, spec: &ExportSpec) -> Result<PathBuf> {
    let name = spec.document.display().to_string();
    let raw = driver
        .read(&spec.source)
        .await
        .map_err(|e| Error::export(&name, format!("cannot read {}: {}", spec.source.display(), e)))?;
    let text = String::from_utf8_lossy(&raw);

    let document = format_document(&spec.title, &text);
    let bytes = document.to_docx_bytes().map_err(|e| Error::export(&name, e))?;
    let path = driver
        .write(&spec.document, &bytes)
        .await
        .map_err(|e| Error::export(&name, e.to_string()))?;

    info!(document = %name, blocks = document.blocks.len(), "export written");
    Ok(path)
}

/// Run every export in order. Stops at the first failure.
pub async fn export_all(driver: &dyn ResourceDriver, specs: &[ExportSpec]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(specs.len());
    for spec in specs {
        written.push(export_document(driver, spec).await?);
    }
    Ok(written)
}

/// Format a file on disk straight into a `.docx` at `dest`.
pub fn export_file(source: &Path, dest: &Path, title: &str) -> Result<()> {
    let name = dest.display().to_string();
    let text = std::fs::read_to_string(source)
        .map_err(|e| Error::export(&name, format!("cannot read {}: {}", source.display(), e)))?;
    let bytes = format_document(title, &text)
        .to_docx_bytes()
        .map_err(|e| Error::export(&name, e))?;
    std::fs::write(dest, bytes).map_err(|e| Error::export(&name, e.to_string()))
}
