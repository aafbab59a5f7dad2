//! Local documents selected by a glob under the documents directory.

use crate::indexer::chunking::{CHUNK_OVERLAP_CHARS, CHUNK_TARGET_CHARS, split_text};
use crate::indexer::{IndexerError, SourceUnit};
use crate::knowledge::{ContentType, KnowledgeChunk};
use crate::locale::Locale;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_EXCLUDES: [&str; 2] = ["**/.git/**", "**/.*"];

/// A readable text file found under the documents directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Path relative to the documents directory, with `/` separators.
    pub relative_path: String,
    /// Absolute or root-joined path on disk.
    pub path: PathBuf,
    /// File contents.
    pub text: String,
}

/// Files under `root` whose relative path matches `pattern`, sorted by path.
///
/// Files that are not valid UTF-8 are logged and left out.
pub fn collect_documents(root: &Path, pattern: &str) -> Result<Vec<DocumentFile>, IndexerError> {
    if !root.is_dir() {
        return Err(IndexerError::DocumentsRoot(root.to_path_buf()));
    }
    let include = build_globset(&[pattern])?;
    let exclude = build_globset(&DEFAULT_EXCLUDES)?;

    let mut documents = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if exclude.is_match(&relative) || !include.is_match(&relative) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => documents.push(DocumentFile {
                relative_path: relative,
                path: path.to_path_buf(),
                text,
            }),
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable document");
            }
        }
    }

    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::info!(
        root = %root.display(),
        pattern,
        documents = documents.len(),
        "Collected documents"
    );
    Ok(documents)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// Source id of a document's chunks.
pub fn document_source_id(document: &DocumentFile) -> String {
    format!("document:{}", document.relative_path)
}

/// Chunk a document tagged with `locale`. Returns `None` when the file holds no text.
pub fn document_unit(document: &DocumentFile, locale: Locale) -> Option<SourceUnit> {
    let source_id = document_source_id(document);
    let title = Path::new(&document.relative_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(['-', '_'], " "))
        .unwrap_or_else(|| document.relative_path.clone());
    let category = Path::new(&document.relative_path)
        .parent()
        .map(|parent| parent.to_string_lossy().to_string())
        .filter(|parent| !parent.is_empty())
        .unwrap_or_else(|| "documents".to_string());

    let chunks: Vec<KnowledgeChunk> = split_text(&document.text, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS)
        .into_iter()
        .enumerate()
        .map(|(index, text)| KnowledgeChunk {
            text,
            locale,
            content_type: ContentType::Document,
            category: category.clone(),
            source_id: source_id.clone(),
            source_url: document.relative_path.clone(),
            source_title: title.clone(),
            chunk_index: index,
            sku: None,
            price: None,
            image_url: None,
            product: None,
        })
        .collect();

    if chunks.is_empty() {
        return None;
    }
    Some(SourceUnit {
        source_id,
        locale,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn documents_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("care")).expect("subdir");
        fs::create_dir_all(dir.path().join(".git")).expect("git dir");
        fs::write(dir.path().join("care/oil-finish.md"), "Oil the floor twice a year.").expect("write");
        fs::write(dir.path().join("warranty.md"), "25 years on engineered oak.").expect("write");
        fs::write(dir.path().join("notes.txt"), "internal").expect("write");
        fs::write(dir.path().join(".git/config.md"), "ignored").expect("write");
        fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00]).expect("write");
        dir
    }

    #[test]
    fn collects_matching_documents_in_order() {
        let dir = documents_dir();
        let documents = collect_documents(dir.path(), "**/*.md").expect("documents");
        let paths: Vec<&str> = documents
            .iter()
            .map(|document| document.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["care/oil-finish.md", "warranty.md"]);
    }

    #[test]
    fn rejects_invalid_glob_and_missing_root() {
        let dir = documents_dir();
        assert!(matches!(
            collect_documents(dir.path(), "[").expect_err("bad glob"),
            IndexerError::Glob(_)
        ));
        assert!(matches!(
            collect_documents(&dir.path().join("missing"), "*.md").expect_err("missing root"),
            IndexerError::DocumentsRoot(_)
        ));
    }

    #[test]
    fn document_unit_tags_locale_and_metadata() {
        let document = DocumentFile {
            relative_path: "care/oil-finish.md".into(),
            path: PathBuf::from("/docs/care/oil-finish.md"),
            text: "Oil the floor twice a year.".into(),
        };
        let unit = document_unit(&document, Locale::Bg).expect("unit");
        assert_eq!(unit.source_id, "document:care/oil-finish.md");
        assert_eq!(unit.locale, Locale::Bg);
        let chunk = &unit.chunks[0];
        assert_eq!(chunk.content_type, ContentType::Document);
        assert_eq!(chunk.category, "care");
        assert_eq!(chunk.source_title, "oil finish");

        let empty = DocumentFile {
            text: "   ".into(),
            ..document
        };
        assert!(document_unit(&empty, Locale::En).is_none());
    }
}
