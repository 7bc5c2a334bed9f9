use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::extract::discover_documents;
use crate::model::{DocumentEntry, DocumentInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir, args.name_marker.as_deref())?;

    if args.dry_run {
        for document in &manifest.documents {
            info!(
                filename = %document.filename,
                kind = %document.kind,
                sha256 = %document.sha256,
                "document"
            );
        }
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.input_dir.join("manifests").join("document_inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(
    input_dir: &Path,
    name_marker: Option<&str>,
) -> Result<DocumentInventoryManifest> {
    let documents = discover_documents(input_dir, name_marker)?;

    if documents.is_empty() {
        bail!("no .txt or .pdf documents found in {}", input_dir.display());
    }

    let mut entries = Vec::with_capacity(documents.len());
    for document in documents {
        let sha256 = sha256_file(&document.path)?;
        entries.push(DocumentEntry {
            filename: document.filename,
            kind: document.kind.as_str().to_string(),
            sha256,
        });
    }

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        name_marker: name_marker.map(ToOwned::to_owned),
        document_count: entries.len(),
        documents: entries,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn build_manifest_hashes_routed_documents_only() {
        let dir = std::env::temp_dir().join(format!("memjobs_inventory_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        fs::write(dir.join("Member_Positions_2024-03-04.txt"), "abc").expect("write member doc");
        fs::write(dir.join("Senate_Positions_2024-03-04.txt"), "xyz").expect("write senate doc");
        fs::write(dir.join("Member_notes.docx"), "ignored").expect("write other doc");

        let manifest = build_manifest(&dir, Some("Member")).expect("inventory builds");

        assert_eq!(manifest.document_count, 1);
        assert_eq!(manifest.name_marker.as_deref(), Some("Member"));
        let entry = &manifest.documents[0];
        assert_eq!(entry.filename, "Member_Positions_2024-03-04.txt");
        assert_eq!(entry.kind, "text");
        assert_eq!(
            entry.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        assert!(build_manifest(&dir, Some("House")).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
