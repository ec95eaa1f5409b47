//! Core data models for the ingestion pipeline.
//!
//! These types represent loaded document content and the per-file lifecycle
//! records that track ingestion progress in the knowledge base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized unit of loaded content produced by a loader backend.
///
/// One `RawDoc` is yielded per logical unit within a file (one per page for
/// PDFs, one per whole file for flat formats). Metadata always carries at
/// least `source_path`; paginated backends add `page`. Immutable once
/// yielded; consumed within one processing pass and never persisted as a
/// distinct entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDoc {
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// Processing status of an ingested file.
///
/// Moves forward through `pending → parsed → chunked → embedded`, or jumps
/// to `failed` from any state. Never regresses to an earlier non-failed
/// stage; the repository is the sole writer and enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Parsed,
    Chunked,
    Embedded,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Parsed => "parsed",
            FileStatus::Chunked => "chunked",
            FileStatus::Embedded => "embedded",
            FileStatus::Failed => "failed",
        }
    }

    /// Position in the forward stage sequence. `Failed` is terminal and
    /// reachable from anywhere, so it has no rank.
    pub fn stage_rank(&self) -> Option<u8> {
        match self {
            FileStatus::Pending => Some(0),
            FileStatus::Parsed => Some(1),
            FileStatus::Chunked => Some(2),
            FileStatus::Embedded => Some(3),
            FileStatus::Failed => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an ingested file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum SourceType {
    Upload,
    Path,
    Url,
    Api,
    Crawl,
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Upload => "upload",
            SourceType::Path => "path",
            SourceType::Url => "url",
            SourceType::Api => "api",
            SourceType::Crawl => "crawl",
            SourceType::Manual => "manual",
        }
    }
}

/// Durable lifecycle record for one ingested file, as stored in the
/// `knowledge_file` table.
///
/// `checksum` + `file_name` + `kb_id` identify a logical file; re-ingesting
/// changed content creates a new record with a bumped `version` rather than
/// mutating the checksum in place. Stage-statistics columns (`chunk_count`,
/// `chunk_profile`, `vector_count`, `embed_model`) are only meaningful once
/// `status` has reached the corresponding stage.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeFile {
    pub id: String,
    pub kb_id: String,
    pub source_type: Option<String>,
    pub source_uri: String,
    pub file_name: String,
    pub file_ext: String,
    pub file_size: i64,
    pub file_mtime: Option<i64>,
    pub checksum: Option<String>,
    pub version: i64,
    pub parser_profile: Option<String>,
    pub chunk_profile: Option<String>,
    pub chunk_count: Option<i64>,
    pub embed_model: Option<String>,
    pub vector_count: Option<i64>,
    pub custom_docs: bool,
    pub status: FileStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for a new lifecycle record. Everything beyond the required
/// provenance columns defaults to the insert-time conventions of the schema.
#[derive(Debug, Clone)]
pub struct NewKnowledgeFile {
    pub kb_id: String,
    pub source_uri: String,
    pub file_name: String,
    pub file_ext: String,
    pub file_size: i64,
    pub source_type: Option<SourceType>,
    pub file_mtime: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub parser_profile: Option<String>,
    pub version: i64,
    pub custom_docs: bool,
}

impl NewKnowledgeFile {
    pub fn new(
        kb_id: impl Into<String>,
        source_uri: impl Into<String>,
        file_name: impl Into<String>,
        file_ext: impl Into<String>,
        file_size: i64,
    ) -> Self {
        Self {
            kb_id: kb_id.into(),
            source_uri: source_uri.into(),
            file_name: file_name.into(),
            file_ext: file_ext.into(),
            file_size,
            source_type: None,
            file_mtime: None,
            checksum: None,
            parser_profile: None,
            version: 1,
            custom_docs: false,
        }
    }
}
