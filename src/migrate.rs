use anyhow::Result;
use sqlx::SqlitePool;

/// Create the record-store schema. Idempotent — safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Tracked documents, one row per identity fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            origin_file_name TEXT NOT NULL DEFAULT '',
            format_file_name TEXT NOT NULL DEFAULT '',
            lower_format_file_name TEXT NOT NULL DEFAULT '',
            content_hash TEXT NOT NULL,
            side_document_hash TEXT NOT NULL,
            document_number0 TEXT NOT NULL DEFAULT '',
            document_number1 TEXT NOT NULL DEFAULT '',
            document_number2 TEXT NOT NULL DEFAULT '',
            part_number0 TEXT NOT NULL DEFAULT '',
            part_number1 TEXT NOT NULL DEFAULT '',
            part_number2 TEXT NOT NULL DEFAULT '',
            document_remote_id TEXT NOT NULL DEFAULT '',
            part_remote_id TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            create_time INTEGER NOT NULL,
            update_time INTEGER NOT NULL,
            file_last_write_time INTEGER NOT NULL DEFAULT 0,
            file_length INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Directory buckets; documents column holds a JSON array of slot ids
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS directories (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            documents TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Content hash → cached side-document hash
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS side_document_relations (
            id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL UNIQUE,
            side_document_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_lower_format_file_name \
         ON documents(lower_format_file_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_directories_path ON directories(path)")
        .execute(pool)
        .await?;

    Ok(())
}
