use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::client::{ChatCompletionsBackend, CompletionBackend, extract};
use super::documents::{SourceDocument, discover_documents, read_document_text};
use super::enrich::enrich;
use super::retry::{RetryOutcome, RetryPolicy, run_with_retry};
use super::scores::{ScoreColumns, ScoreTable, load_csv};
use super::segment::segment;
use super::throttle::{CancelToken, Throttle};
use super::validate::validate;
use crate::cli::{ExtractArgs, ScoreArgs};
use crate::commands::export::write_records_csv;
use crate::error::ExtractError;
use crate::model::{
    DocumentOutcome, JobRecord, ListingChunk, ModelSettings, RunCounts, RunManifest, RunPaths,
};
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

pub fn run(args: ExtractArgs) -> Result<()> {
    let backend = ChatCompletionsBackend::new(&args.model)?;
    let cancel = match &args.stop_file {
        Some(path) => CancelToken::with_stop_file(path.clone()),
        None => CancelToken::new(),
    };

    let manifest = run_batch(&args, &backend, &cancel)?;
    info!(
        status = %manifest.status,
        records = manifest.counts.records_emitted,
        "extract finished"
    );
    Ok(())
}

enum BatchEnd {
    Completed,
    Cancelled,
}

/// Runs the whole batch and always leaves a run manifest behind, including
/// when the batch aborts.
pub fn run_batch(
    args: &ExtractArgs,
    backend: &dyn CompletionBackend,
    cancel: &CancelToken,
) -> Result<RunManifest> {
    let started_ts = Utc::now();
    let run_id = format!("run-{}", utc_compact_string(started_ts));
    let manifest_path = args
        .output_dir
        .join("manifests")
        .join(format!("extract_run_{}.json", utc_compact_string(started_ts)));

    ensure_directory(&args.output_dir)?;

    info!(
        input_dir = %args.input_dir.display(),
        output_dir = %args.output_dir.display(),
        model = %args.model.model,
        run_id = %run_id,
        "starting extract"
    );

    let mut manifest = new_manifest(args, run_id);

    match execute(args, backend, cancel, &mut manifest) {
        Ok(BatchEnd::Completed) => manifest.status = "completed".to_string(),
        Ok(BatchEnd::Cancelled) => {
            warn!("extract cancelled; unfinished documents will be picked up by the next run");
            manifest.status = "cancelled".to_string();
        }
        Err(err) => {
            manifest.status = "failed".to_string();
            manifest.failure_reason = Some(format!("{err:#}"));
            manifest.updated_at = now_utc_string();
            write_json_pretty(&manifest_path, &manifest)?;
            info!(path = %manifest_path.display(), "wrote failed extract run manifest");
            return Err(err);
        }
    }

    manifest.updated_at = now_utc_string();
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote extract run manifest");

    Ok(manifest)
}

fn execute(
    args: &ExtractArgs,
    backend: &dyn CompletionBackend,
    cancel: &CancelToken,
    manifest: &mut RunManifest,
) -> Result<BatchEnd> {
    let table = load_score_table(&args.scores)?;
    manifest.counts.score_keys_loaded = table.as_ref().map_or(0, ScoreTable::len);
    if table.is_none() {
        manifest
            .warnings
            .push("no score file configured; DW_NOMINATE and LES are null".to_string());
    }

    let documents = discover_documents(&args.input_dir, args.name_marker.as_deref())?;
    manifest.counts.documents_found = documents.len();
    if documents.is_empty() {
        warn!(input_dir = %args.input_dir.display(), "no input documents found");
    }

    let mut pipeline = Pipeline {
        backend,
        scores: table.as_ref(),
        policy: RetryPolicy::from_args(&args.retry),
        throttle: Throttle::new(Duration::from_millis(args.retry.request_delay_ms)),
        cancel,
    };

    let mut all_records = Vec::new();
    let mut end = BatchEnd::Completed;

    for document in &documents {
        if cancel.is_cancelled() {
            end = BatchEnd::Cancelled;
            break;
        }

        let output_path = args.output_dir.join(format!("{}.json", document.stem));
        if output_path.exists() && !args.force {
            info!(document = %document.filename, "output already exists; skipping");
            manifest.counts.documents_skipped += 1;
            manifest.documents.push(outcome(document, None, "skipped"));
            continue;
        }

        let sha256 = match sha256_file(&document.path) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(document = %document.filename, error = %err, "failed to hash document");
                None
            }
        };

        let text = match read_document_text(document) {
            Ok(text) => text,
            Err(err) => {
                warn!(document = %document.filename, error = %err, "skipping unreadable document");
                manifest.counts.documents_failed += 1;
                manifest.warnings.push(err.to_string());
                manifest.documents.push(DocumentOutcome {
                    error: Some(err.message.clone()),
                    ..outcome(document, sha256, "read_failed")
                });
                continue;
            }
        };

        info!(document = %document.filename, kind = document.kind.as_str(), "processing document");

        let result = pipeline
            .process_text(&text, &args.delimiter, &document.filename)
            .with_context(|| format!("aborting batch while processing {}", document.filename))?;

        let counts = &mut manifest.counts;
        counts.chunks_total += result.chunk_count;
        counts.chunks_failed += result.chunks_failed;
        counts.records_rejected += result.records_rejected;
        counts.retries += result.retries;
        counts.records_enriched += result.records_enriched;

        let mut document_outcome = DocumentOutcome {
            chunk_count: result.chunk_count,
            record_count: result.records.len(),
            ..outcome(document, sha256, "completed")
        };

        if result.cancelled {
            document_outcome.status = "cancelled".to_string();
            manifest.documents.push(document_outcome);
            end = BatchEnd::Cancelled;
            break;
        }

        if result.records.is_empty() {
            info!(document = %document.filename, "no listings parsed; no output written");
            manifest.counts.documents_without_records += 1;
            document_outcome.status = "no_records".to_string();
        } else {
            write_json_pretty(&output_path, &result.records)?;
            info!(
                document = %document.filename,
                records = result.records.len(),
                path = %output_path.display(),
                "wrote document records"
            );
            manifest.counts.records_emitted += result.records.len();
            document_outcome.output_path = Some(output_path.display().to_string());
            all_records.extend(result.records);
        }

        manifest.counts.documents_processed += 1;
        manifest.documents.push(document_outcome);
    }

    info!(
        documents = manifest.counts.documents_processed,
        skipped = manifest.counts.documents_skipped,
        records = manifest.counts.records_emitted,
        rejected = manifest.counts.records_rejected,
        failed_chunks = manifest.counts.chunks_failed,
        "batch summary"
    );

    if let Some(csv_path) = &args.csv_path {
        if all_records.is_empty() {
            info!("no data to write to combined csv");
        } else {
            write_records_csv(csv_path, &all_records)?;
            info!(path = %csv_path.display(), records = all_records.len(), "wrote combined csv");
        }
    }

    Ok(end)
}

pub fn load_score_table(args: &ScoreArgs) -> Result<Option<ScoreTable>> {
    let Some(path) = &args.score_file else {
        warn!("no score file configured; DW_NOMINATE and LES will be null");
        return Ok(None);
    };

    let sheet = load_csv(path)?;
    let table = ScoreTable::build(&sheet, args.join_key, &ScoreColumns::from_args(args))
        .with_context(|| format!("failed to build score table from {}", path.display()))?;

    if table.is_empty() {
        bail!("score table {} produced no usable rows", path.display());
    }

    info!(
        keys = table.len(),
        join_key = args.join_key.as_str(),
        latest_session = ?table.latest_session(),
        "score table ready"
    );
    Ok(Some(table))
}

#[derive(Debug, Default)]
pub struct DocumentResult {
    pub records: Vec<JobRecord>,
    pub chunk_count: usize,
    pub chunks_failed: usize,
    pub records_rejected: usize,
    pub retries: usize,
    pub records_enriched: usize,
    pub cancelled: bool,
}

/// Per-chunk pipeline: throttle, extract with retries, validate, enrich.
pub struct Pipeline<'a> {
    pub backend: &'a dyn CompletionBackend,
    pub scores: Option<&'a ScoreTable>,
    pub policy: RetryPolicy,
    pub throttle: Throttle,
    pub cancel: &'a CancelToken,
}

impl Pipeline<'_> {
    /// Only a non-transient transport failure is returned as an error; every
    /// other failure is absorbed into the counts.
    pub fn process_text(
        &mut self,
        text: &str,
        delimiter: &str,
        source_filename: &str,
    ) -> Result<DocumentResult, ExtractError> {
        let chunks = segment(text, delimiter);
        let mut result = DocumentResult {
            chunk_count: chunks.len(),
            ..DocumentResult::default()
        };

        if chunks.is_empty() {
            warn!(document = source_filename, delimiter, "no listing delimiter found");
            return Ok(result);
        }

        let total = chunks.len();
        for chunk in &chunks {
            if self.cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            info!(document = source_filename, chunk = chunk.index, total, "processing chunk");
            self.process_chunk(chunk, source_filename, &mut result)?;
        }

        Ok(result)
    }

    fn process_chunk(
        &mut self,
        chunk: &ListingChunk,
        source_filename: &str,
        result: &mut DocumentResult,
    ) -> Result<(), ExtractError> {
        let backend = self.backend;
        let throttle = &mut self.throttle;

        let outcome = run_with_retry(&self.policy, |attempt| {
            throttle.wait();
            debug!(chunk = chunk.index, attempt, "requesting extraction");
            let raw = extract(backend, chunk, source_filename)?;
            validate(&raw)
        })?;

        match outcome {
            RetryOutcome::Succeeded { value, retries } => {
                result.retries += retries as usize;

                for violation in &value.violations {
                    warn!(
                        chunk = chunk.index,
                        post_id = ?violation.post_id,
                        reason = %violation.reason,
                        "dropping invalid record"
                    );
                }
                result.records_rejected += value.violations.len();

                info!(
                    chunk = chunk.index,
                    records = value.records.len(),
                    rejected = value.violations.len(),
                    retries,
                    "chunk extracted"
                );

                if value.depth_limited > 0 {
                    warn!(
                        chunk = chunk.index,
                        nodes = value.depth_limited,
                        "model output nested too deeply; deep values ignored"
                    );
                }

                for record in value.records {
                    let record = enrich(record, self.scores);
                    if record.dw_nominate.is_some() || record.les.is_some() {
                        result.records_enriched += 1;
                    }
                    result.records.push(record);
                }
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    chunk = chunk.index,
                    attempts,
                    error = %last_error,
                    "skipping chunk after failed extraction attempts"
                );
                result.retries += attempts.saturating_sub(1) as usize;
                result.chunks_failed += 1;
            }
        }

        Ok(())
    }
}

fn outcome(document: &SourceDocument, sha256: Option<String>, status: &str) -> DocumentOutcome {
    DocumentOutcome {
        filename: document.filename.clone(),
        sha256,
        status: status.to_string(),
        chunk_count: 0,
        record_count: 0,
        output_path: None,
        error: None,
    }
}

fn new_manifest(args: &ExtractArgs, run_id: String) -> RunManifest {
    let started_at = now_utc_string();
    RunManifest {
        manifest_version: 1,
        run_id,
        status: "running".to_string(),
        started_at: started_at.clone(),
        updated_at: started_at,
        failure_reason: None,
        command: render_extract_command(args),
        join_key: args.scores.join_key.as_str().to_string(),
        model: ModelSettings {
            base_url: args.model.base_url.clone(),
            model: args.model.model.clone(),
            temperature: args.model.temperature,
            max_attempts: args.retry.max_attempts,
            backoff_ms: args.retry.backoff_ms,
            retry_mode: args.retry.retry_mode.as_str().to_string(),
            request_delay_ms: args.retry.request_delay_ms,
        },
        paths: RunPaths {
            input_dir: args.input_dir.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            score_file: args.scores.score_file.as_deref().map(display_path),
            csv_path: args.csv_path.as_deref().map(display_path),
        },
        counts: RunCounts::default(),
        documents: Vec::new(),
        warnings: Vec::new(),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

pub(super) fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "memjobs".to_string(),
        "extract".to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--delimiter".to_string(),
        args.delimiter.clone(),
    ];

    if let Some(marker) = &args.name_marker {
        command.push("--name-marker".to_string());
        command.push(marker.clone());
    }
    if args.force {
        command.push("--force".to_string());
    }
    if let Some(path) = &args.csv_path {
        command.push("--csv-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.stop_file {
        command.push("--stop-file".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.scores.score_file {
        command.push("--score-file".to_string());
        command.push(path.display().to_string());
        command.push("--join-key".to_string());
        command.push(args.scores.join_key.as_str().to_string());
        if args.scores.no_session_filter {
            command.push("--no-session-filter".to_string());
        }
    }

    command.push("--base-url".to_string());
    command.push(args.model.base_url.clone());
    command.push("--model".to_string());
    command.push(args.model.model.clone());
    command.push("--temperature".to_string());
    command.push(args.model.temperature.to_string());
    command.push("--max-attempts".to_string());
    command.push(args.retry.max_attempts.to_string());
    command.push("--backoff-ms".to_string());
    command.push(args.retry.backoff_ms.to_string());
    command.push("--retry-mode".to_string());
    command.push(args.retry.retry_mode.as_str().to_string());
    if args.retry.request_delay_ms > 0 {
        command.push("--request-delay-ms".to_string());
        command.push(args.retry.request_delay_ms.to_string());
    }

    command.join(" ")
}
