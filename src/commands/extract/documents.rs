use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::error::FileReadError;
use crate::util::{has_extension, list_files};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        if has_extension(path, "txt") {
            Some(Self::Text)
        } else if has_extension(path, "pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub filename: String,
    pub stem: String,
    pub kind: DocumentKind,
}

/// Finds `.txt` and `.pdf` files in `input_dir`, keeping only filenames that
/// contain `name_marker` when one is given. Outputs are named by stem, so only
/// the first document of each stem is kept.
pub fn discover_documents(
    input_dir: &Path,
    name_marker: Option<&str>,
) -> Result<Vec<SourceDocument>> {
    if !input_dir.is_dir() {
        bail!("input directory not found: {}", input_dir.display());
    }

    let mut documents = Vec::new();
    let mut stems = HashSet::new();
    for path in list_files(input_dir)? {
        let Some(kind) = DocumentKind::from_path(&path) else {
            continue;
        };

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        if let Some(marker) = name_marker {
            if !filename.contains(marker) {
                continue;
            }
        }

        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(filename.as_str())
            .to_string();

        if !stems.insert(stem.clone()) {
            warn!(
                document = %filename,
                stem = %stem,
                "another document already uses this stem; skipping"
            );
            continue;
        }

        documents.push(SourceDocument {
            path,
            filename,
            stem,
            kind,
        });
    }

    Ok(documents)
}

pub fn read_document_text(document: &SourceDocument) -> Result<String, FileReadError> {
    match document.kind {
        DocumentKind::Text => fs::read_to_string(&document.path).map_err(|err| FileReadError {
            path: document.path.clone(),
            message: err.to_string(),
        }),
        DocumentKind::Pdf => extract_text_with_pdftotext(&document.path),
    }
}

fn extract_text_with_pdftotext(pdf_path: &Path) -> Result<String, FileReadError> {
    let read_error = |message: String| FileReadError {
        path: pdf_path.to_path_buf(),
        message,
    };

    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .map_err(|err| read_error(format!("failed to execute pdftotext: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(read_error(format!(
            "pdftotext returned non-zero exit status: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .split('\u{000C}')
        .map(|page| page.replace('\u{0000}', ""))
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "memjobs_documents_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn discovery_keeps_one_document_per_stem() {
        let dir = scratch_dir("stems");
        fs::write(dir.join("Member_Positions_2024-03-04.pdf"), b"%PDF-1.4").expect("write pdf");
        fs::write(dir.join("Member_Positions_2024-03-04.txt"), "MEM-001-24").expect("write txt");
        fs::write(dir.join("Member_Positions_2024-03-11.TXT"), "MEM-002-24").expect("write txt");
        fs::write(dir.join("Member_Positions_2024-03-18.docx"), "ignored").expect("write docx");

        let documents = discover_documents(&dir, None).expect("discovery succeeds");
        let names: Vec<&str> = documents.iter().map(|doc| doc.filename.as_str()).collect();

        assert_eq!(
            names,
            vec!["Member_Positions_2024-03-04.pdf", "Member_Positions_2024-03-11.TXT"]
        );
        assert_eq!(documents[0].kind, DocumentKind::Pdf);
        assert_eq!(documents[1].kind, DocumentKind::Text);
        assert_eq!(documents[1].stem, "Member_Positions_2024-03-11");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = std::env::temp_dir()
            .join(format!("memjobs_documents_missing_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        assert!(discover_documents(&dir, None).is_err());
    }
}
