// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record store writer — serializes patch images into a transactional
// embedded store, one store per (artifact kind, split).  Writes are
// batched: the transaction is committed and the WAL checkpointed every
// `commit_interval` writes, bounding memory growth and preserving partial
// progress across a crash.
//
// Schema:
//   records(
//     key       TEXT    PRIMARY KEY,  -- "<base + index*stride>:<index>:<stem>"
//     channels  INTEGER NOT NULL,
//     width     INTEGER NOT NULL,
//     height    INTEGER NOT NULL,
//     encoding  TEXT    NOT NULL,     -- "png"
//     data      BLOB    NOT NULL      -- encoded payload bytes
//   )

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use scriptorium_core::config::PackagingConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::{debug, error, info, instrument};

/// Database filename inside each store directory.
const STORE_FILE: &str = "records.sqlite";

/// Convert a `rusqlite::Error` into a `ScriptoriumError::Database`.
fn db_err(e: rusqlite::Error) -> ScriptoriumError {
    ScriptoriumError::Database(e.to_string())
}

/// One serialized patch as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub channels: u8,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub data: Vec<u8>,
}

/// Record key: a numeric prefix spaced by a constant stride (ordering stays
/// stable and later insertions fit between existing keys without
/// renumbering), the sequential index, and the source file's stem.
pub fn record_key(base: u64, stride: u64, index: u64, stem: &str) -> String {
    format!("{}:{}:{}", base + index * stride, index, stem)
}

/// A transactional embedded store for one (artifact kind, split) pair.
///
/// Sequential per store — a single transaction cursor.  Writing the four
/// stores of one split in parallel is safe since each owns an independent
/// database file.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) the store directory and its database.
    ///
    /// WAL mode is enabled so that checkpoints flush durably between
    /// commits.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let conn = Connection::open(dir.as_ref().join(STORE_FILE)).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        Self::init_schema(&conn)?;
        debug!("record store opened");
        Ok(Self { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                key       TEXT    PRIMARY KEY,
                channels  INTEGER NOT NULL,
                width     INTEGER NOT NULL,
                height    INTEGER NOT NULL,
                encoding  TEXT    NOT NULL,
                data      BLOB    NOT NULL
            );",
        )
        .map_err(db_err)
    }

    /// Serialize every image in `source` into this store.
    ///
    /// Files are visited in sorted listing order.  Every
    /// `config.commit_interval` writes the transaction commits and the WAL
    /// is checkpointed, then a fresh transaction opens; the tail commits at
    /// the end.  A decode or insert failure logs the offending filename and
    /// propagates; a commit or checkpoint failure aborts the whole run.
    #[instrument(skip(self, config), fields(source = %source.display()))]
    pub fn write_directory(&mut self, source: &Path, config: &PackagingConfig) -> Result<usize> {
        let files = list_files(source)?;
        let indexed: Vec<(usize, &PathBuf)> = files.iter().enumerate().collect();
        let batch = config.commit_interval.max(1);

        let mut written = 0usize;
        for chunk in indexed.chunks(batch) {
            let tx = self.conn.transaction().map_err(db_err)?;
            for &(index, path) in chunk {
                insert_record(&tx, config, index, path).map_err(|e| {
                    let file = path.display().to_string();
                    error!(%file, error = %e, "record store write failed");
                    e.on_file(file)
                })?;
                written += 1;
            }
            tx.commit().map_err(db_err)?;
            self.conn
                .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(db_err)?;
            debug!(written, "batch committed");
        }

        info!(written, "store complete");
        Ok(written)
    }

    /// Number of records in the store.
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// All keys, in insertion (numeric-prefix) order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM records ORDER BY key")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(db_err)?);
        }
        Ok(keys)
    }

    /// Fetch one record by key.
    pub fn get(&self, key: &str) -> Result<Option<DatasetRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT channels, width, height, encoding, data
                 FROM records WHERE key = ?1",
            )
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![key], |row| {
                Ok(DatasetRecord {
                    channels: row.get(0)?,
                    width: row.get(1)?,
                    height: row.get(2)?,
                    encoding: row.get(3)?,
                    data: row.get(4)?,
                })
            })
            .map_err(db_err)?;

        match rows.next() {
            Some(record) => Ok(Some(record.map_err(db_err)?)),
            None => Ok(None),
        }
    }
}

/// Decode one patch file and insert it under its record key.
///
/// The image keeps its channel count as decoded; the payload is the
/// PNG-encoded bytes.
fn insert_record(
    tx: &rusqlite::Transaction<'_>,
    config: &PackagingConfig,
    index: usize,
    path: &Path,
) -> Result<()> {
    let image = image::open(path)
        .map_err(|e| ScriptoriumError::ImageError(format!("decode failed: {e}")))?;

    let channels = image.color().channel_count();
    let (width, height) = (image.width(), image.height());

    let mut payload = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut payload),
            image::ImageFormat::Png,
        )
        .map_err(|e| ScriptoriumError::ImageError(format!("encode failed: {e}")))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let key = record_key(config.key_base, config.key_stride, index as u64, &stem);

    tx.execute(
        "INSERT INTO records (key, channels, width, height, encoding, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![key, channels, width, height, "png", payload],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Sorted file listing of a split subdirectory.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_patches(dir: &Path, count: usize) {
        for i in 0..count {
            let img = GrayImage::from_pixel(8, 8, Luma([i as u8]));
            img.save(dir.join(format!("img_{i:03}.png"))).unwrap();
        }
    }

    fn store_config() -> PackagingConfig {
        PackagingConfig::default()
    }

    #[test]
    fn twenty_five_files_twenty_five_records() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("patches");
        std::fs::create_dir(&source).unwrap();
        write_patches(&source, 25);

        let mut store = RecordStore::open(tmp.path().join("original_images_train_lmdb")).unwrap();
        let written = store.write_directory(&source, &store_config()).unwrap();

        assert_eq!(written, 25);
        assert_eq!(store.count().unwrap(), 25);

        // No gaps: every index 0..25 resolves through its key.
        for index in 0..25u64 {
            let key = record_key(76_547_000, 37, index, &format!("img_{index:03}"));
            assert!(store.get(&key).unwrap().is_some(), "missing key {key}");
        }
    }

    #[test]
    fn key_format_and_stride() {
        assert_eq!(record_key(76_547_000, 37, 0, "img_0"), "76547000:0:img_0");
        assert_eq!(record_key(76_547_000, 37, 3, "img_3"), "76547111:3:img_3");
    }

    #[test]
    fn record_fields_reflect_the_image() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("patches");
        std::fs::create_dir(&source).unwrap();
        RgbImage::from_pixel(16, 9, Rgb([1, 2, 3]))
            .save(source.join("color.png"))
            .unwrap();

        let mut store = RecordStore::open(tmp.path().join("store")).unwrap();
        store.write_directory(&source, &store_config()).unwrap();

        let key = record_key(76_547_000, 37, 0, "color");
        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.channels, 3);
        assert_eq!(record.width, 16);
        assert_eq!(record.height, 9);
        assert_eq!(record.encoding, "png");

        // Payload is a decodable PNG round-tripping the pixels.
        let decoded = image::load_from_memory(&record.data).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn grayscale_channel_count_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("patches");
        std::fs::create_dir(&source).unwrap();
        write_patches(&source, 1);

        let mut store = RecordStore::open(tmp.path().join("store")).unwrap();
        store.write_directory(&source, &store_config()).unwrap();

        let key = record_key(76_547_000, 37, 0, "img_000");
        assert_eq!(store.get(&key).unwrap().unwrap().channels, 1);
    }

    #[test]
    fn unreadable_file_surfaces_its_name_and_halts() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("patches");
        std::fs::create_dir(&source).unwrap();
        write_patches(&source, 15);
        // Sorts between img_011 and img_012.
        std::fs::write(source.join("img_011a.png"), b"not a png").unwrap();

        let mut store = RecordStore::open(tmp.path().join("store")).unwrap();
        let err = store.write_directory(&source, &store_config()).unwrap_err();

        match err {
            ScriptoriumError::Record { file, .. } => assert!(file.contains("img_011a.png")),
            other => panic!("expected Record error, got {other}"),
        }

        // The first full batch of 10 was committed before the failure.
        assert_eq!(store.count().unwrap(), 10);
    }

    #[test]
    fn keys_are_unique() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("patches");
        std::fs::create_dir(&source).unwrap();
        write_patches(&source, 12);

        let mut store = RecordStore::open(tmp.path().join("store")).unwrap();
        store.write_directory(&source, &store_config()).unwrap();

        let mut keys = store.keys().unwrap();
        let before = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert_eq!(before, 12);
    }
}
