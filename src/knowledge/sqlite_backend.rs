//! `SQLite` + sqlite-vec backend.
//!
//! Each collection is a pair of tables sharing rowids:
//! - `{name}`: document id, content, metadata JSON
//! - `{name}_embeddings`: `vec0` virtual table, `float[ndims]`, L2 distance

use std::path::Path;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::core::ids::DocumentId;
use crate::knowledge::backend::{BackendFuture, ScoredDocument, VectorBackend};
use crate::knowledge::document::{DocumentMetadata, RetrievableDocument};
use crate::knowledge::sqlite_vec_loader::init_sqlite_vec_extension;

/// Largest `k` accepted by a `vec0` KNN query.
const MAX_KNN: usize = 4096;

struct RawHit {
    id: String,
    content: String,
    metadata_json: String,
    distance: f64,
}

/// Vector backend on a single `SQLite` file.
pub struct SqliteVecBackend {
    conn: Connection,
}

impl SqliteVecBackend {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> ChatifyResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open(path.as_ref()).await?;
        Self::prepare(conn).await
    }

    /// In-memory database.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be opened.
    pub async fn open_in_memory() -> ChatifyResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open_in_memory().await?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> ChatifyResult<Self> {
        let version = conn
            .call(|conn| {
                let _mode: String =
                    conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
                let version: String =
                    conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
                Ok(version)
            })
            .await?;
        debug!(version, "sqlite-vec ready");
        Ok(Self { conn })
    }
}

fn embeddings_table(name: &str) -> String {
    format!("{name}_embeddings")
}

fn table_exists(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn collection_present(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<bool> {
    Ok(table_exists(conn, name)? && table_exists(conn, &embeddings_table(name))?)
}

fn missing(name: &str) -> ChatifyError {
    ChatifyError::NeedsReinitialization {
        collection: name.to_string(),
    }
}

fn vector_json(vector: &[f32]) -> ChatifyResult<String> {
    Ok(serde_json::to_string(vector)?)
}

impl RawHit {
    #[allow(clippy::cast_possible_truncation)]
    fn into_scored(self) -> ChatifyResult<ScoredDocument> {
        let id = DocumentId::from_str(&self.id)
            .map_err(|err| ChatifyError::Operation {
                operation: "search",
                message: format!("invalid document id: {err}"),
            })?;
        let metadata: DocumentMetadata = serde_json::from_str(&self.metadata_json)?;
        Ok(ScoredDocument {
            document: RetrievableDocument {
                id,
                content: self.content,
                metadata,
            },
            distance: self.distance as f32,
        })
    }
}

impl VectorBackend for SqliteVecBackend {
    fn collection_exists(&self, name: &str) -> BackendFuture<'_, ChatifyResult<bool>> {
        let name = name.to_string();
        Box::pin(async move {
            let exists = self
                .conn
                .call(move |conn| Ok(collection_present(conn, &name)?))
                .await?;
            Ok(exists)
        })
    }

    fn create_collection(&self, name: &str, ndims: usize) -> BackendFuture<'_, ChatifyResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            if ndims == 0 {
                return Err(ChatifyError::InvalidConfig(
                    "embedding dimension must be positive".to_string(),
                ));
            }
            let embeddings = embeddings_table(&name);
            let created = name.clone();
            self.conn
                .call(move |conn| {
                    conn.execute_batch(&format!(
                        "BEGIN;
                         CREATE TABLE IF NOT EXISTS {name} (
                             rowid INTEGER PRIMARY KEY,
                             id TEXT NOT NULL UNIQUE,
                             content TEXT NOT NULL,
                             metadata_json TEXT NOT NULL
                         );
                         CREATE VIRTUAL TABLE IF NOT EXISTS {embeddings} USING vec0(
                             embedding float[{ndims}]
                         );
                         COMMIT;"
                    ))?;
                    Ok(())
                })
                .await?;
            info!(collection = %created, ndims, "collection created");
            Ok(())
        })
    }

    fn drop_collection(&self, name: &str) -> BackendFuture<'_, ChatifyResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let embeddings = embeddings_table(&name);
            self.conn
                .call(move |conn| {
                    conn.execute_batch(&format!(
                        "BEGIN;
                         DROP TABLE IF EXISTS {embeddings};
                         DROP TABLE IF EXISTS {name};
                         COMMIT;"
                    ))?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn insert(
        &self,
        name: &str,
        entries: Vec<(RetrievableDocument, Vec<f32>)>,
    ) -> BackendFuture<'_, ChatifyResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut rows = Vec::with_capacity(entries.len());
            for (document, vector) in &entries {
                rows.push((
                    document.id.to_string(),
                    document.content.clone(),
                    serde_json::to_string(&document.metadata)?,
                    vector_json(vector)?,
                ));
            }
            let target = name.clone();
            let inserted = self
                .conn
                .call(move |conn| {
                    if !collection_present(conn, &target)? {
                        return Ok(false);
                    }
                    let embeddings = embeddings_table(&target);
                    let tx = conn.transaction()?;
                    {
                        let mut insert_doc = tx.prepare(&format!(
                            "INSERT INTO {target} (id, content, metadata_json) VALUES (?1, ?2, ?3)"
                        ))?;
                        let mut insert_vec = tx.prepare(&format!(
                            "INSERT INTO {embeddings} (rowid, embedding) VALUES (?1, ?2)"
                        ))?;
                        for (id, content, metadata_json, vector) in &rows {
                            insert_doc.execute(params![id, content, metadata_json])?;
                            let rowid = tx.last_insert_rowid();
                            insert_vec.execute(params![rowid, vector])?;
                        }
                    }
                    tx.commit()?;
                    Ok(true)
                })
                .await?;
            if inserted { Ok(()) } else { Err(missing(&name)) }
        })
    }

    fn nearest(
        &self,
        name: &str,
        query: Vec<f32>,
        k: usize,
    ) -> BackendFuture<'_, ChatifyResult<Vec<ScoredDocument>>> {
        let name = name.to_string();
        Box::pin(async move {
            let query = vector_json(&query)?;
            let k = i64::try_from(k.min(MAX_KNN)).unwrap_or(0);
            let target = name.clone();
            let hits = self
                .conn
                .call(move |conn| {
                    if !collection_present(conn, &target)? {
                        return Ok(None);
                    }
                    if k == 0 {
                        return Ok(Some(Vec::new()));
                    }
                    let embeddings = embeddings_table(&target);
                    let mut stmt = conn.prepare(&format!(
                        "WITH knn AS (
                             SELECT rowid, distance FROM {embeddings}
                             WHERE embedding MATCH ?1 AND k = ?2
                         )
                         SELECT d.id, d.content, d.metadata_json, knn.distance
                         FROM knn JOIN {target} d ON d.rowid = knn.rowid
                         ORDER BY knn.distance"
                    ))?;
                    let hits = stmt
                        .query_map(params![query, k], |row| {
                            Ok(RawHit {
                                id: row.get(0)?,
                                content: row.get(1)?,
                                metadata_json: row.get(2)?,
                                distance: row.get(3)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Some(hits))
                })
                .await?;
            let hits = hits.ok_or_else(|| missing(&name))?;
            hits.into_iter().map(RawHit::into_scored).collect()
        })
    }

    fn count(&self, name: &str) -> BackendFuture<'_, ChatifyResult<usize>> {
        let name = name.to_string();
        Box::pin(async move {
            let target = name.clone();
            let count = self
                .conn
                .call(move |conn| {
                    if !collection_present(conn, &target)? {
                        return Ok(None);
                    }
                    let count: i64 =
                        conn.query_row(&format!("SELECT count(*) FROM {target}"), [], |row| {
                            row.get(0)
                        })?;
                    Ok(Some(count))
                })
                .await?;
            let count = count.ok_or_else(|| missing(&name))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::document::DocumentKind;

    fn doc(content: &str) -> RetrievableDocument {
        RetrievableDocument {
            id: DocumentId::random(),
            content: content.to_string(),
            metadata: DocumentMetadata::new(DocumentKind::SavedTrack, "user-1"),
        }
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let backend = SqliteVecBackend::open_in_memory().await.unwrap();
        assert!(!backend.collection_exists("music_profile_a").await.unwrap());

        backend.create_collection("music_profile_a", 3).await.unwrap();
        assert!(backend.collection_exists("music_profile_a").await.unwrap());
        assert_eq!(backend.count("music_profile_a").await.unwrap(), 0);

        backend.drop_collection("music_profile_a").await.unwrap();
        backend.drop_collection("music_profile_a").await.unwrap();
        assert!(!backend.collection_exists("music_profile_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_nearest_orders_by_l2_distance() {
        let backend = SqliteVecBackend::open_in_memory().await.unwrap();
        backend.create_collection("music_profile_a", 3).await.unwrap();
        backend
            .insert(
                "music_profile_a",
                vec![
                    (doc("far"), vec![0.0, 0.0, 9.0]),
                    (doc("near"), vec![1.0, 0.0, 0.0]),
                    (doc("mid"), vec![1.0, 2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = backend
            .nearest("music_profile_a", vec![1.0, 0.0, 0.0], 2)
            .await
            .unwrap();
        let contents: Vec<_> = hits.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "mid"]);
        assert_eq!(hits[0].document.metadata.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let backend = SqliteVecBackend::open_in_memory().await.unwrap();
        backend.create_collection("music_profile_a", 2).await.unwrap();
        backend.create_collection("music_profile_b", 2).await.unwrap();
        backend
            .insert("music_profile_a", vec![(doc("only a"), vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(backend.count("music_profile_b").await.unwrap(), 0);
        let hits = backend
            .nearest("music_profile_b", vec![1.0, 0.0], 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_needs_reinitialization() {
        let backend = SqliteVecBackend::open_in_memory().await.unwrap();
        let err = backend
            .nearest("music_profile_x", vec![1.0], 1)
            .await
            .unwrap_err();
        assert!(err.needs_reinitialization());
        let err = backend
            .insert("music_profile_x", vec![(doc("x"), vec![1.0])])
            .await
            .unwrap_err();
        assert!(err.needs_reinitialization());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatify.sqlite");
        {
            let backend = SqliteVecBackend::open(&path).await.unwrap();
            backend.create_collection("music_profile_a", 2).await.unwrap();
            backend
                .insert("music_profile_a", vec![(doc("kept"), vec![0.5, 0.5])])
                .await
                .unwrap();
        }
        let backend = SqliteVecBackend::open(&path).await.unwrap();
        assert_eq!(backend.count("music_profile_a").await.unwrap(), 1);
    }
}
