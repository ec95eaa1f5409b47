//! Data access layer for `knowledge_file` lifecycle records.
//!
//! This repository is the sole writer and reader of lifecycle rows. Every
//! mutation runs inside a transaction that is rolled back on failure, so
//! concurrent readers never observe a half-updated record.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::models::{FileStatus, KnowledgeFile, NewKnowledgeFile};

/// Stage statistics attached to a status update. Only the fields matching
/// the target status are consulted; the rest are ignored.
#[derive(Debug, Clone, Default)]
pub struct StageStats {
    pub chunk_count: Option<i64>,
    pub chunk_profile: Option<String>,
    pub vector_count: Option<i64>,
    pub embed_model: Option<String>,
}

const SELECT_COLUMNS: &str = "id, kb_id, source_type, source_uri, file_name, file_ext, \
     file_size, file_mtime, checksum, version, parser_profile, chunk_profile, \
     chunk_count, embed_model, vector_count, custom_docs, status, created_at, updated_at";

#[derive(Clone)]
pub struct KnowledgeFileRepository {
    pool: SqlitePool,
}

impl KnowledgeFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new lifecycle record and returns its generated id.
    ///
    /// The record starts in status `pending`; the orchestrator advances it
    /// to `parsed` as a separate step once loading has succeeded.
    pub async fn insert(&self, file: &NewKnowledgeFile) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO knowledge_file
                (id, kb_id, source_type, source_uri, file_name, file_ext,
                 file_size, file_mtime, checksum, version, parser_profile,
                 custom_docs, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&file.kb_id)
        .bind(file.source_type.map(|s| s.as_str()))
        .bind(&file.source_uri)
        .bind(&file.file_name)
        .bind(&file.file_ext)
        .bind(file.file_size)
        .bind(file.file_mtime.map(|t| t.timestamp()))
        .bind(&file.checksum)
        .bind(file.version)
        .bind(&file.parser_profile)
        .bind(file.custom_docs)
        .bind(FileStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(id = %id, file = %file.file_name, "inserted file record");
        Ok(id)
    }

    /// Advances a record's status, applying the stage-field policy:
    ///
    /// - `chunked`: also sets `chunk_count` (default 0) and `chunk_profile`
    ///   (default `default`).
    /// - `embedded`: also sets `vector_count` (default 0) and `embed_model`
    ///   (default `unknown`); chunk fields are left untouched.
    /// - anything else: only the status column changes.
    ///
    /// Status only moves forward, or jumps to `failed` from anywhere;
    /// `failed` is terminal. Re-applying the current status is allowed and
    /// keeps previously-set stage fields unless new values are supplied. A
    /// regression to an earlier stage, or any move out of `failed`, is
    /// rejected with [`IngestError::InvalidInput`]. `updated_at` is
    /// refreshed by the store on every call.
    pub async fn update_status(
        &self,
        id: &str,
        status: FileStatus,
        stats: StageStats,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<FileStatus> =
            sqlx::query_scalar("SELECT status FROM knowledge_file WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current
            .ok_or_else(|| IngestError::InvalidInput(format!("no such file record: {}", id)))?;

        if current == FileStatus::Failed && status != FileStatus::Failed {
            return Err(IngestError::InvalidInput(format!(
                "record {} is failed; status cannot leave the terminal state",
                id
            )));
        }
        if let (Some(from), Some(to)) = (current.stage_rank(), status.stage_rank()) {
            if to < from {
                return Err(IngestError::InvalidInput(format!(
                    "status cannot regress from '{}' to '{}' for {}",
                    current, status, id
                )));
            }
        }

        // On a fresh transition, unspecified stage fields take the stage
        // defaults; on a same-status re-apply they keep their stored values.
        let entering = current != status;
        match status {
            FileStatus::Chunked => {
                let chunk_count = stats
                    .chunk_count
                    .or(if entering { Some(0) } else { None });
                let chunk_profile = stats
                    .chunk_profile
                    .or_else(|| entering.then(|| "default".to_string()));
                sqlx::query(
                    "UPDATE knowledge_file SET status = ?, \
                     chunk_count = COALESCE(?, chunk_count), \
                     chunk_profile = COALESCE(?, chunk_profile) \
                     WHERE id = ?",
                )
                .bind(status)
                .bind(chunk_count)
                .bind(chunk_profile)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            FileStatus::Embedded => {
                let vector_count = stats
                    .vector_count
                    .or(if entering { Some(0) } else { None });
                let embed_model = stats
                    .embed_model
                    .or_else(|| entering.then(|| "unknown".to_string()));
                sqlx::query(
                    "UPDATE knowledge_file SET status = ?, \
                     vector_count = COALESCE(?, vector_count), \
                     embed_model = COALESCE(?, embed_model) \
                     WHERE id = ?",
                )
                .bind(status)
                .bind(vector_count)
                .bind(embed_model)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            _ => {
                sqlx::query("UPDATE knowledge_file SET status = ? WHERE id = ?")
                    .bind(status)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(id = %id, status = %status, "updated file status");
        Ok(())
    }

    /// Point lookup. Not-found is a normal outcome, distinct from a
    /// connectivity error.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<KnowledgeFile>> {
        let sql = format!("SELECT {} FROM knowledge_file WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, KnowledgeFile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_none() {
            warn!(id = %id, "file record not found");
        } else {
            debug!(id = %id, "found file record");
        }
        Ok(row)
    }

    /// All records in a knowledge base, most recently created first.
    pub async fn get_by_kb_id(&self, kb_id: &str) -> Result<Vec<KnowledgeFile>> {
        let sql = format!(
            "SELECT {} FROM knowledge_file WHERE kb_id = ? ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, KnowledgeFile>(&sql)
            .bind(kb_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(kb_id = %kb_id, count = rows.len(), "listed file records");
        Ok(rows)
    }
}
