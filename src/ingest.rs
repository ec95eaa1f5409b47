//! Indexing orchestration for single files.
//!
//! Sequences checksum → load → record insertion → status update for one
//! file. On any failure after a record exists, the record is marked
//! `failed` (best effort) before the original error propagates. The
//! orchestrator never retries; retry policy belongs to the batch driver.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::error::{IngestError, Result};
use crate::loader::{FileLoader, Loader};
use crate::models::{FileStatus, NewKnowledgeFile, RawDoc, SourceType};
use crate::repo::{KnowledgeFileRepository, StageStats};

/// Block size for streamed checksum reads; memory use is independent of
/// file size.
const CHECKSUM_BLOCK_BYTES: usize = 8192;

/// Orchestrates the ingestion of single files into one knowledge base.
pub struct Indexer {
    kb_id: String,
    repo: KnowledgeFileRepository,
    loader: FileLoader,
}

impl Indexer {
    pub fn new(kb_id: impl Into<String>, repo: KnowledgeFileRepository, loader: FileLoader) -> Self {
        Self {
            kb_id: kb_id.into(),
            repo,
            loader,
        }
    }

    /// Indexes one file and returns its new record id.
    ///
    /// Steps: validate the path (exists, regular file, supported
    /// extension), checksum it, load it fully (the document count decides
    /// success), insert a `pending` lifecycle record with provenance +
    /// checksum + parser name, then advance to `parsed`. Failures before
    /// the insert leave no record behind; failures after it mark the
    /// record `failed` before propagating.
    pub async fn index_file(&self, path: &Path) -> Result<String> {
        info!(path = %path.display(), "indexing file");

        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(IngestError::InvalidInput(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if !self.loader.accepts(path) {
            let ext = crate::loader::normalized_ext(path).unwrap_or_default();
            return Err(IngestError::UnsupportedFormat(ext));
        }

        let checksum = file_checksum(path)?;
        debug!(path = %path.display(), checksum = %checksum, "computed checksum");

        // Materialize the lazy sequence: the count decides success.
        let docs: Vec<RawDoc> = self.loader.load(vec![path.to_path_buf()], None).collect();
        if docs.is_empty() {
            return Err(IngestError::EmptyResult(path.to_path_buf()));
        }
        if let Some(first) = docs.first() {
            let preview: String = first.text.chars().take(100).collect();
            debug!(path = %path.display(), count = docs.len(), preview = %preview, "loaded documents");
        }

        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_ext = crate::loader::normalized_ext(path).unwrap_or_default();

        let mut record = NewKnowledgeFile::new(
            self.kb_id.clone(),
            path.display().to_string(),
            file_name,
            file_ext,
            metadata.len() as i64,
        );
        record.source_type = Some(SourceType::Path);
        record.file_mtime = file_mtime(&metadata);
        record.checksum = Some(checksum);
        record.parser_profile = Some(self.loader.get_parser_name(path).to_string());

        let id = self.repo.insert(&record).await?;

        // A record now exists: any further failure must mark it failed.
        if let Err(err) = self
            .repo
            .update_status(&id, FileStatus::Parsed, StageStats::default())
            .await
        {
            return Err(self.mark_failed(&id, err).await);
        }

        info!(id = %id, path = %path.display(), "indexed file");
        Ok(id)
    }

    /// Best-effort recovery: mark the record `failed`, returning the
    /// original error. A secondary failure here is logged, never allowed to
    /// mask the original one.
    async fn mark_failed(&self, id: &str, original: IngestError) -> IngestError {
        if let Err(update_err) = self
            .repo
            .update_status(id, FileStatus::Failed, StageStats::default())
            .await
        {
            error!(id = %id, error = %update_err, "could not mark record failed");
        }
        original
    }
}

/// SHA-256 hex digest of a file's content, streamed in fixed-size blocks.
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut block = [0u8; CHECKSUM_BLOCK_BYTES];
    loop {
        let n = file.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn file_mtime(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    let modified = metadata.modified().ok()?;
    let secs = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .ok()?
        .as_secs() as i64;
    Utc.timestamp_opt(secs, 0).single()
}
