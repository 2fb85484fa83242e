//! Persistent speaker table.
//!
//! A single SQLite table in WAL mode keyed by speaker id, holding the
//! little-endian float32 embedding blob, its dimension, and the enrollment
//! count. The whole table is loaded into the in-memory cache at session
//! start; rows whose declared dimension disagrees with the blob length are
//! skipped with a warning rather than aborting startup.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::VoiceprintError;

/// One enrolled speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerProfile {
    /// Opaque UTF-8 identifier, unique and case-sensitive.
    pub speaker_id: String,
    /// L2-normalization of the mean of all enrolled embeddings.
    pub embedding: Vec<f32>,
    /// Number of enrollments folded into the embedding.
    pub enroll_count: u32,
}

/// SQLite-backed speaker table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database, enabling WAL and a 5 s busy timeout.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VoiceprintError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        let mode: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(%mode, "could not enable WAL journal mode");
        }
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS speakers (
                speaker_id    TEXT PRIMARY KEY,
                embedding     BLOB NOT NULL,
                embedding_dim INTEGER NOT NULL,
                enroll_count  INTEGER DEFAULT 1,
                created_at    DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at    DATETIME DEFAULT CURRENT_TIMESTAMP
            );",
        )?;

        tracing::info!(path = %path.display(), "speaker database opened");
        Ok(Self { conn })
    }

    /// Inserts or replaces a profile.
    pub fn save(&self, profile: &SpeakerProfile) -> Result<(), VoiceprintError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO speakers
                (speaker_id, embedding, embedding_dim, enroll_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP);",
            params![
                profile.speaker_id,
                embedding_to_blob(&profile.embedding),
                profile.embedding.len() as i64,
                profile.enroll_count,
            ],
        )?;
        tracing::debug!(
            speaker = %profile.speaker_id,
            dim = profile.embedding.len(),
            count = profile.enroll_count,
            "profile saved"
        );
        Ok(())
    }

    /// Loads one profile, or `None` when absent or inconsistent.
    pub fn load(&self, speaker_id: &str) -> Result<Option<SpeakerProfile>, VoiceprintError> {
        let row = self
            .conn
            .query_row(
                "SELECT speaker_id, embedding, embedding_dim, enroll_count
                 FROM speakers WHERE speaker_id = ?1;",
                params![speaker_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(row_to_profile))
    }

    /// Loads every profile, skipping inconsistent rows.
    pub fn load_all(&self) -> Result<Vec<SpeakerProfile>, VoiceprintError> {
        let mut stmt = self.conn.prepare(
            "SELECT speaker_id, embedding, embedding_dim, enroll_count FROM speakers;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            if let Some(profile) = row_to_profile(row?) {
                profiles.push(profile);
            }
        }
        tracing::info!(count = profiles.len(), "speakers loaded from database");
        Ok(profiles)
    }

    /// Deletes a profile. Returns false when the row did not exist.
    pub fn remove(&self, speaker_id: &str) -> Result<bool, VoiceprintError> {
        let changes = self.conn.execute(
            "DELETE FROM speakers WHERE speaker_id = ?1;",
            params![speaker_id],
        )?;
        Ok(changes > 0)
    }

    /// Number of persisted profiles.
    pub fn count(&self) -> Result<usize, VoiceprintError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM speakers;", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Whether a profile exists.
    pub fn exists(&self, speaker_id: &str) -> Result<bool, VoiceprintError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM speakers WHERE speaker_id = ?1 LIMIT 1;",
                params![speaker_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_profile(row: (String, Vec<u8>, i64, i64)) -> Option<SpeakerProfile> {
    let (speaker_id, blob, dim, enroll_count) = row;
    if dim < 0 || blob.len() != dim as usize * 4 {
        tracing::warn!(
            speaker = %speaker_id,
            dim,
            blob_len = blob.len(),
            "skipping row with inconsistent embedding dimension"
        );
        return None;
    }
    Some(SpeakerProfile {
        speaker_id,
        embedding: blob_to_embedding(&blob),
        enroll_count: enroll_count.max(1) as u32,
    })
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &v in embedding {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn profile(id: &str, dim: usize, count: u32) -> SpeakerProfile {
        SpeakerProfile {
            speaker_id: id.into(),
            embedding: (0..dim).map(|i| i as f32 * 0.01).collect(),
            enroll_count: count,
        }
    }

    #[test]
    fn save_and_load_roundtrip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("speakers.db")).unwrap();

        let p = profile("alice", 192, 3);
        store.save(&p).unwrap();

        let back = store.load("alice").unwrap().unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn reopen_preserves_profiles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("speakers.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&profile("a", 16, 1)).unwrap();
            store.save(&profile("b", 16, 2)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn save_replaces_existing() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("s.db")).unwrap();

        store.save(&profile("x", 8, 1)).unwrap();
        store.save(&profile("x", 8, 2)).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.load("x").unwrap().unwrap().enroll_count, 2);
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("s.db")).unwrap();

        store.save(&profile("gone", 8, 1)).unwrap();
        assert!(store.remove("gone").unwrap());
        assert!(!store.remove("gone").unwrap());
        assert!(!store.exists("gone").unwrap());
    }

    #[test]
    fn inconsistent_dim_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.db");
        let store = SqliteStore::open(&path).unwrap();
        store.save(&profile("good", 8, 1)).unwrap();

        // Corrupt a row: declared dim no longer matches the blob.
        store
            .conn
            .execute(
                "INSERT INTO speakers (speaker_id, embedding, embedding_dim) VALUES ('bad', ?1, 99);",
                params![vec![0u8; 12]],
            )
            .unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].speaker_id, "good");
        assert!(store.load("bad").unwrap().is_none());
    }

    #[test]
    fn unicode_speaker_ids() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("s.db")).unwrap();

        let p = profile("说话人-Ω", 4, 1);
        store.save(&p).unwrap();
        assert!(store.exists("说话人-Ω").unwrap());
        assert_eq!(store.load("说话人-Ω").unwrap().unwrap(), p);
    }

    #[test]
    fn blob_conversion_roundtrip() {
        let values = vec![0.0f32, -1.5, 3.25, f32::MIN_POSITIVE];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&values)), values);
    }
}
