use crate::models::*;
use anyhow::{anyhow, Context, Result};
use pulldown_cmark::{Event, Parser, TagEnd};
use regex::Regex;
use std::fs;
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Markdown,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            "md" | "markdown" => Some(DocumentKind::Markdown),
            _ => None,
        }
    }
}

pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Loads every PDF, text and Markdown file under `documents_dir`, recursively.
    ///
    /// Returned documents are grouped PDF first, then text, then Markdown. A missing
    /// directory is treated as empty. Files that fail to load are logged and skipped.
    pub fn process_documents(&self, documents_dir: &Path) -> Result<Vec<Document>> {
        log::info!("Loading documents from directory {}...", documents_dir.display());

        if !documents_dir.exists() {
            log::warn!("Documents directory {} does not exist", documents_dir.display());
            return Ok(Vec::new());
        }

        let mut pdf_documents = Vec::new();
        let mut txt_documents = Vec::new();
        let mut md_documents = Vec::new();

        for entry in WalkDir::new(documents_dir)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!(
                        "Skipping unreadable entry under {}: {}",
                        documents_dir.display(),
                        e
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let file_path = entry.path();
            let filename = entry.file_name().to_string_lossy().to_string();
            let Some(kind) = DocumentKind::from_filename(&filename) else {
                continue;
            };

            let source = file_path.to_string_lossy().to_string();
            let loaded = match fs::read(file_path)
                .with_context(|| format!("Failed to read {}", file_path.display()))
                .and_then(|bytes| self.load_kind(kind, &source, &bytes, None))
            {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::error!("Skipping {}: {:#}", file_path.display(), e);
                    continue;
                }
            };

            match kind {
                DocumentKind::Pdf => pdf_documents.extend(loaded),
                DocumentKind::Text => txt_documents.extend(loaded),
                DocumentKind::Markdown => md_documents.extend(loaded),
            }
        }

        log::info!("Loaded {} pdf documents", pdf_documents.len());
        log::info!("Loaded {} txt documents", txt_documents.len());
        log::info!("Loaded {} markdown documents", md_documents.len());

        let mut documents = pdf_documents;
        documents.append(&mut txt_documents);
        documents.append(&mut md_documents);

        log::info!("Loaded {} documents in total", documents.len());
        Ok(documents)
    }

    /// Loads an in-memory file. Names without a known extension are read as PDF.
    pub fn load_bytes(
        &self,
        source: &str,
        bytes: &[u8],
        file_id: Option<String>,
    ) -> Result<Vec<Document>> {
        let kind = DocumentKind::from_filename(source).unwrap_or(DocumentKind::Pdf);
        self.load_kind(kind, source, bytes, file_id)
    }

    fn load_kind(
        &self,
        kind: DocumentKind,
        source: &str,
        bytes: &[u8],
        file_id: Option<String>,
    ) -> Result<Vec<Document>> {
        let pages: Vec<(Option<u32>, String)> = match kind {
            DocumentKind::Pdf => self
                .extract_pdf_pages(source, bytes)?
                .into_iter()
                .map(|(page, text)| (Some(page), text))
                .collect(),
            DocumentKind::Text => vec![(None, String::from_utf8_lossy(bytes).to_string())],
            DocumentKind::Markdown => {
                let markdown = String::from_utf8_lossy(bytes);
                vec![(None, self.markdown_to_text(&markdown)?)]
            }
        };

        let documents = pages
            .into_iter()
            .filter(|(_, content)| !content.trim().is_empty())
            .map(|(page, content)| Document {
                id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                page,
                file_id: file_id.clone(),
                content,
            })
            .collect::<Vec<_>>();

        log::info!("Processed {}: {} document(s)", source, documents.len());
        Ok(documents)
    }

    /// Extracts text page by page with zero-based page numbers.
    fn extract_pdf_pages(&self, source: &str, bytes: &[u8]) -> Result<Vec<(u32, String)>> {
        match lopdf::Document::load_mem(bytes) {
            Ok(pdf) => {
                let mut pages = Vec::new();
                for page_number in pdf.get_pages().keys() {
                    match pdf.extract_text(&[*page_number]) {
                        Ok(text) => {
                            pages.push((page_number.saturating_sub(1), self.clean_text(&text)?))
                        }
                        Err(e) => {
                            log::warn!("Skipping page {} of {}: {}", page_number, source, e)
                        }
                    }
                }
                Ok(pages)
            }
            Err(e) => {
                log::warn!("lopdf could not parse {} ({}), falling back to pdf-extract", source, e);
                let text = pdf_extract::extract_text_from_mem(bytes)
                    .map_err(|e| anyhow!("Failed to extract text from {}: {}", source, e))?;
                Ok(vec![(0, self.clean_text(&text)?)])
            }
        }
    }

    fn markdown_to_text(&self, markdown: &str) -> Result<String> {
        let mut text = String::new();

        for event in Parser::new(markdown) {
            match event {
                Event::Text(value) | Event::Code(value) => text.push_str(&value),
                Event::SoftBreak | Event::HardBreak => text.push('\n'),
                Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Heading(_))
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::CodeBlock) => text.push_str("\n\n"),
                _ => {}
            }
        }

        self.clean_text(&text)
    }

    fn clean_text(&self, text: &str) -> Result<String> {
        let re_spaces = Regex::new(r"[ \t]+")?;
        let re_trailing = Regex::new(r"(?m)[ \t]+$")?;
        let re_blank_lines = Regex::new(r"\n{3,}")?;

        let cleaned = re_spaces.replace_all(text, " ");
        let cleaned = re_trailing.replace_all(&cleaned, "");
        let cleaned = re_blank_lines.replace_all(&cleaned, "\n\n");

        Ok(cleaned.trim().to_string())
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new()
    }
}
