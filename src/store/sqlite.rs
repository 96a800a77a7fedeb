//! SQLite-backed [`RecordStore`] implementation.
//!
//! One row per document keyed by the identity fingerprint (UNIQUE index);
//! directory buckets persist their slot arrays as JSON text. Ids are v4
//! UUIDs assigned at insert. Bucket-creation order is the implicit rowid
//! order of the `directories` table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{DirectoryRecord, DocumentRecord, SideDocumentRelation};

use super::RecordStore;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn document_from_row(row: &SqliteRow) -> DocumentRecord {
    DocumentRecord {
        id: row.get("id"),
        key: row.get("key"),
        origin_file_name: row.get("origin_file_name"),
        format_file_name: row.get("format_file_name"),
        lower_format_file_name: row.get("lower_format_file_name"),
        content_hash: row.get("content_hash"),
        side_document_hash: row.get("side_document_hash"),
        document_number0: row.get("document_number0"),
        document_number1: row.get("document_number1"),
        document_number2: row.get("document_number2"),
        part_number0: row.get("part_number0"),
        part_number1: row.get("part_number1"),
        part_number2: row.get("part_number2"),
        document_remote_id: row.get("document_remote_id"),
        part_remote_id: row.get("part_remote_id"),
        display_name: row.get("display_name"),
        create_time: row.get("create_time"),
        update_time: row.get("update_time"),
        file_last_write_time: row.get("file_last_write_time"),
        file_length: row.get("file_length"),
    }
}

fn directory_from_row(row: &SqliteRow) -> Result<DirectoryRecord> {
    let documents_json: String = row.get("documents");
    let documents: Vec<String> = serde_json::from_str(&documents_json)
        .with_context(|| "Malformed documents column in directories table")?;
    Ok(DirectoryRecord {
        id: row.get("id"),
        path: row.get("path"),
        documents,
    })
}

const DOCUMENT_COLUMNS: &str = "id, key, origin_file_name, format_file_name, \
    lower_format_file_name, content_hash, side_document_hash, \
    document_number0, document_number1, document_number2, \
    part_number0, part_number1, part_number2, \
    document_remote_id, part_remote_id, display_name, \
    create_time, update_time, file_last_write_time, file_length";

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO documents (id, key, origin_file_name, format_file_name,
                lower_format_file_name, content_hash, side_document_hash,
                document_number0, document_number1, document_number2,
                part_number0, part_number1, part_number2,
                document_remote_id, part_remote_id, display_name,
                create_time, update_time, file_last_write_time, file_length)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&record.key)
        .bind(&record.origin_file_name)
        .bind(&record.format_file_name)
        .bind(&record.lower_format_file_name)
        .bind(&record.content_hash)
        .bind(&record.side_document_hash)
        .bind(&record.document_number0)
        .bind(&record.document_number1)
        .bind(&record.document_number2)
        .bind(&record.part_number0)
        .bind(&record.part_number1)
        .bind(&record.part_number2)
        .bind(&record.document_remote_id)
        .bind(&record.part_remote_id)
        .bind(&record.display_name)
        .bind(record.create_time)
        .bind(record.update_time)
        .bind(record.file_last_write_time)
        .bind(record.file_length)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_document(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents SET
                document_remote_id = ?,
                part_remote_id = ?,
                display_name = ?,
                update_time = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.document_remote_id)
        .bind(&record.part_remote_id)
        .bind(&record.display_name)
        .bind(record.update_time)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_document_by_key(&self, key: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE key = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn contains_document_key(&self, key: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn find_document_by_id(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn insert_directory(&self, record: &DirectoryRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let documents_json = serde_json::to_string(&record.documents)?;
        sqlx::query("INSERT INTO directories (id, path, documents) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&record.path)
            .bind(&documents_json)
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn update_directory(&self, record: &DirectoryRecord) -> Result<()> {
        let documents_json = serde_json::to_string(&record.documents)?;
        sqlx::query("UPDATE directories SET documents = ? WHERE id = ?")
            .bind(&documents_json)
            .bind(&record.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_directories_by_path(&self, path: &str) -> Result<Vec<DirectoryRecord>> {
        let rows =
            sqlx::query("SELECT id, path, documents FROM directories WHERE path = ? ORDER BY rowid")
                .bind(path)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(directory_from_row).collect()
    }

    async fn insert_side_relation(&self, relation: &SideDocumentRelation) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO side_document_relations (id, content_hash, side_document_hash) \
             VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(&relation.content_hash)
        .bind(&relation.side_document_hash)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_side_relation(
        &self,
        content_hash: &str,
    ) -> Result<Option<SideDocumentRelation>> {
        let row = sqlx::query(
            "SELECT id, content_hash, side_document_hash FROM side_document_relations \
             WHERE content_hash = ?",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| SideDocumentRelation {
            id: row.get("id"),
            content_hash: row.get("content_hash"),
            side_document_hash: row.get("side_document_hash"),
        }))
    }

    async fn contains_side_relation(&self, content_hash: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM side_document_relations WHERE content_hash = ?")
                .bind(content_hash)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }
}
