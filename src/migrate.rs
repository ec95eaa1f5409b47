//! Schema migrations for the `knowledge_file` lifecycle table.

use sqlx::SqlitePool;

use crate::error::Result;

/// Creates the lifecycle schema. Idempotent; safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_file (
            id TEXT PRIMARY KEY,
            kb_id TEXT NOT NULL,
            source_type TEXT
                CHECK (source_type IS NULL OR source_type IN
                       ('upload','path','url','api','crawl','manual')),
            source_uri TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_ext TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_mtime INTEGER,
            checksum TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            parser_profile TEXT,
            chunk_profile TEXT,
            chunk_count INTEGER,
            embed_model TEXT,
            vector_count INTEGER,
            custom_docs INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','parsed','chunked','embedded','failed')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_file_kb_id ON knowledge_file(kb_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_knowledge_file_created_at ON knowledge_file(created_at DESC)",
    )
    .execute(pool)
    .await?;

    // Store-side refresh of updated_at on any row update. Recursive
    // triggers are off by default, so the inner UPDATE does not re-fire.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS knowledge_file_touch_updated_at
        AFTER UPDATE ON knowledge_file
        FOR EACH ROW
        BEGIN
            UPDATE knowledge_file
            SET updated_at = strftime('%s', 'now')
            WHERE id = NEW.id;
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
