use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::RunManifest;
use crate::util::{has_extension, list_files, read_json};

const RUN_MANIFEST_PREFIX: &str = "extract_run_";

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.output_dir.join("manifests");

    info!(output_dir = %args.output_dir.display(), "status requested");

    if !manifest_dir.is_dir() {
        warn!(path = %manifest_dir.display(), "manifest directory missing; no runs recorded");
        return Ok(());
    }

    let Some(latest_path) = latest_run_manifest(&manifest_dir)? else {
        warn!(path = %manifest_dir.display(), "no extract run manifests found");
        return Ok(());
    };

    let manifest: RunManifest = read_json(&latest_path)?;
    let counts = &manifest.counts;

    info!(
        path = %latest_path.display(),
        run_id = %manifest.run_id,
        status = %manifest.status,
        started_at = %manifest.started_at,
        updated_at = %manifest.updated_at,
        model = %manifest.model.model,
        join_key = %manifest.join_key,
        failure_reason = %manifest.failure_reason.clone().unwrap_or_default(),
        "loaded latest extract run manifest"
    );
    info!(
        documents_found = counts.documents_found,
        documents_processed = counts.documents_processed,
        documents_skipped = counts.documents_skipped,
        documents_failed = counts.documents_failed,
        documents_without_records = counts.documents_without_records,
        chunks_total = counts.chunks_total,
        chunks_failed = counts.chunks_failed,
        records_emitted = counts.records_emitted,
        records_rejected = counts.records_rejected,
        retries = counts.retries,
        records_enriched = counts.records_enriched,
        "run counts"
    );

    for warning in &manifest.warnings {
        warn!(warning = %warning, "recorded run warning");
    }

    Ok(())
}

/// Run manifests embed a compact UTC timestamp, so the lexically greatest
/// name is the most recent run.
pub fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    let latest = list_files(manifest_dir)?
        .into_iter()
        .filter(|path| has_extension(path, "json"))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(RUN_MANIFEST_PREFIX))
        })
        .max();

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn latest_run_manifest_picks_newest_timestamp() {
        let dir = std::env::temp_dir().join(format!("memjobs_status_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");

        assert_eq!(latest_run_manifest(&dir).expect("empty dir lists"), None);

        for name in [
            "extract_run_20240301T090000Z.json",
            "extract_run_20240302T120000Z.json",
            "document_inventory.json",
        ] {
            fs::write(dir.join(name), "{}").expect("write manifest");
        }

        let latest = latest_run_manifest(&dir)
            .expect("manifest dir lists")
            .expect("a run manifest exists");
        assert_eq!(
            latest.file_name().and_then(|name| name.to_str()),
            Some("extract_run_20240302T120000Z.json")
        );

        let _ = fs::remove_dir_all(&dir);
    }
}
