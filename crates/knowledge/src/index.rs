//! SQLite snapshot of a vector index.
//!
//! Layout: `index_meta(key, value)` holds the format version, the embedding
//! fingerprint and the chunk count; `chunks(seq, text, metadata, embedding)`
//! holds one row per chunk in insertion order, with metadata as JSON and the
//! embedding as little-endian `f32` bytes.

use crate::document::Metadata;
use crate::embeddings::EmbeddingFingerprint;
use crate::vector_index::{EmbeddedChunk, VectorIndex};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use umrah_core::{AppError, AppResult};

pub const FORMAT_VERSION: &str = "1";

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> AppError {
    AppError::IndexCorrupt(format!("{}: {}", path.display(), detail))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index.sqlite".into());
    name.push(".tmp");
    path.with_file_name(name)
}

impl VectorIndex {
    /// Write the index to `path`, atomically replacing any previous snapshot.
    pub fn persist(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(path);
        if tmp.exists() {
            std::fs::remove_file(&tmp)?;
        }

        write_snapshot(self, &tmp).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            e
        })?;
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            chunks = self.len(),
            "Persisted index snapshot"
        );
        Ok(())
    }

    /// Load a snapshot written by [`VectorIndex::persist`].
    ///
    /// # Errors
    /// `AppError::IndexNotFound` if no file exists at `path`;
    /// `AppError::IndexCorrupt` for anything that cannot be read back.
    pub fn restore(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::IndexNotFound(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| corrupt(path, e))?;

        let meta = read_meta(&conn, path)?;
        let field = |key: &str| {
            meta.get(key)
                .cloned()
                .ok_or_else(|| corrupt(path, format!("missing index_meta key '{}'", key)))
        };

        let version = field("format_version")?;
        if version != FORMAT_VERSION {
            return Err(corrupt(
                path,
                format!("unsupported format version {}", version),
            ));
        }

        let dimensions: usize = field("dimensions")?
            .parse()
            .map_err(|e| corrupt(path, format!("bad dimensions: {}", e)))?;
        let expected_count: usize = field("chunk_count")?
            .parse()
            .map_err(|e| corrupt(path, format!("bad chunk_count: {}", e)))?;
        let fingerprint = EmbeddingFingerprint {
            provider: field("provider")?,
            model: field("model")?,
            dimensions,
        };

        let chunks = read_chunks(&conn, path, dimensions)?;
        if chunks.len() != expected_count {
            return Err(corrupt(
                path,
                format!(
                    "expected {} chunks, found {}",
                    expected_count,
                    chunks.len()
                ),
            ));
        }

        tracing::info!(
            path = %path.display(),
            chunks = chunks.len(),
            fingerprint = %fingerprint,
            "Restored index snapshot"
        );

        Ok(VectorIndex::from_parts(fingerprint, chunks))
    }
}

fn write_snapshot(index: &VectorIndex, path: &Path) -> AppResult<()> {
    let mut conn = Connection::open(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to create snapshot: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE chunks (
            seq INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL,
            embedding BLOB NOT NULL
        );
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    let tx = conn
        .transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;

    {
        let fingerprint = index.fingerprint();
        let dimensions = fingerprint.dimensions.to_string();
        let chunk_count = index.len().to_string();
        let meta = [
            ("format_version", FORMAT_VERSION),
            ("provider", fingerprint.provider.as_str()),
            ("model", fingerprint.model.as_str()),
            ("dimensions", dimensions.as_str()),
            ("chunk_count", chunk_count.as_str()),
        ];

        let mut stmt = tx
            .prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
            .map_err(|e| AppError::Knowledge(format!("Failed to write metadata: {}", e)))?;
        for (key, value) in meta {
            stmt.execute(params![key, value])
                .map_err(|e| AppError::Knowledge(format!("Failed to write metadata: {}", e)))?;
        }

        let mut stmt = tx
            .prepare("INSERT INTO chunks (seq, text, metadata, embedding) VALUES (?1, ?2, ?3, ?4)")
            .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
        for (seq, chunk) in index.chunks().iter().enumerate() {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            stmt.execute(params![
                seq as i64,
                chunk.text,
                metadata_json,
                embedding_to_bytes(&chunk.vector),
            ])
            .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
        }
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit snapshot: {}", e)))?;

    Ok(())
}

fn read_meta(conn: &Connection, path: &Path) -> AppResult<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM index_meta")
        .map_err(|e| corrupt(path, e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| corrupt(path, e))?;

    let mut meta = HashMap::new();
    for row in rows {
        let (key, value) = row.map_err(|e| corrupt(path, e))?;
        meta.insert(key, value);
    }
    Ok(meta)
}

fn read_chunks(conn: &Connection, path: &Path, dimensions: usize) -> AppResult<Vec<EmbeddedChunk>> {
    let mut stmt = conn
        .prepare("SELECT text, metadata, embedding FROM chunks ORDER BY seq")
        .map_err(|e| corrupt(path, e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })
        .map_err(|e| corrupt(path, e))?;

    let mut chunks = Vec::new();
    for row in rows {
        let (text, metadata_json, bytes) = row.map_err(|e| corrupt(path, e))?;
        let metadata: Metadata = serde_json::from_str(&metadata_json)
            .map_err(|e| corrupt(path, format!("bad chunk metadata: {}", e)))?;
        let vector = bytes_to_embedding(&bytes).map_err(|e| corrupt(path, e))?;
        if vector.len() != dimensions {
            return Err(corrupt(
                path,
                format!(
                    "chunk embedding has {} dimensions, expected {}",
                    vector.len(),
                    dimensions
                ),
            ));
        }
        chunks.push(EmbeddedChunk {
            text,
            metadata,
            vector,
        });
    }
    Ok(chunks)
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("invalid embedding length {}", bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetaValue;
    use crate::embeddings::providers::MockProvider;
    use crate::embeddings::{EmbeddingProvider, RetryPolicy};
    use tempfile::TempDir;

    fn fingerprint() -> EmbeddingFingerprint {
        EmbeddingFingerprint {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 3,
        }
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new(fingerprint());
        for (i, text) in ["Ihram at the miqat", "Tawaf seven circuits", "Sa'i between hills"]
            .iter()
            .enumerate()
        {
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), "ritual_guide".into());
            metadata.insert("order".to_string(), MetaValue::Int(i as i64));
            metadata.insert("mandatory".to_string(), MetaValue::Bool(true));
            let mut vector = vec![0.0; 3];
            vector[i] = 1.0;
            index
                .insert(vec![EmbeddedChunk {
                    text: text.to_string(),
                    metadata,
                    vector,
                }])
                .unwrap();
        }
        index
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/index.sqlite");
        let index = sample_index();

        index.persist(&path).unwrap();
        assert!(!temp_path(&path).exists());

        let restored = VectorIndex::restore(&path).unwrap();
        assert_eq!(restored.fingerprint(), index.fingerprint());
        assert_eq!(restored.chunks(), index.chunks());

        let query = [0.0, 1.0, 0.0];
        assert_eq!(
            restored.search_by_vector(&query, 2, None).unwrap(),
            index.search_by_vector(&query, 2, None).unwrap()
        );
    }

    #[tokio::test]
    async fn test_restored_chunks_find_themselves_by_text() {
        let provider = MockProvider::new(128);
        let texts = [
            "Ihram is entered at the miqat before crossing into the haram.",
            "Tawaf is seven anti-clockwise circuits around the Kaaba.",
            "Sa'i is walking seven times between Safa and Marwah.",
            "Dar Al Eiman Royal overlooks the Kaaba in Makkah.",
            "Quba Mosque in Madinah was the first mosque built.",
            "The Haramain train links Makkah and Madinah via Jeddah.",
        ];

        let mut index = VectorIndex::new(provider.fingerprint());
        for text in texts {
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), "ritual_guide".into());
            index
                .insert(vec![EmbeddedChunk {
                    text: text.to_string(),
                    metadata,
                    vector: provider.embed(text).await.unwrap(),
                }])
                .unwrap();
        }

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        index.persist(&path).unwrap();
        let restored = VectorIndex::restore(&path).unwrap();
        assert_eq!(restored.len(), texts.len());

        let k = 3;
        for chunk in restored.chunks() {
            let hits = restored
                .search(&provider, &chunk.text, k, None, &RetryPolicy::default())
                .await
                .unwrap();
            assert!(
                hits.iter().any(|hit| hit.text == chunk.text),
                "{:?} not in its own top {}",
                chunk.text,
                k
            );
        }
    }

    #[test]
    fn test_persist_replaces_existing_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");

        sample_index().persist(&path).unwrap();
        VectorIndex::new(fingerprint()).persist(&path).unwrap();

        let restored = VectorIndex::restore(&path).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = VectorIndex::restore(&temp.path().join("absent.sqlite")).unwrap_err();
        assert!(err.is_index_not_found());
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        std::fs::write(&path, "this is not a sqlite database\n".repeat(64)).unwrap();

        let err = VectorIndex::restore(&path).unwrap_err();
        assert!(matches!(err, AppError::IndexCorrupt(_)), "got {:?}", err);
    }

    #[test]
    fn test_wrong_format_version_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        sample_index().persist(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE index_meta SET value = '99' WHERE key = 'format_version'",
            [],
        )
        .unwrap();
        drop(conn);

        let err = VectorIndex::restore(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 99"));
    }

    #[test]
    fn test_chunk_count_mismatch_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        sample_index().persist(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute("DELETE FROM chunks WHERE seq = 1", []).unwrap();
        drop(conn);

        assert!(matches!(
            VectorIndex::restore(&path),
            Err(AppError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_truncated_embedding_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        sample_index().persist(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE chunks SET embedding = x'0000803F' WHERE seq = 0",
            [],
        )
        .unwrap();
        drop(conn);

        assert!(matches!(
            VectorIndex::restore(&path),
            Err(AppError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_embedding_bytes() {
        let bytes = embedding_to_bytes(&[1.0, -0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![1.0, -0.5]);
        assert!(bytes_to_embedding(&bytes[..5]).is_err());
    }
}
