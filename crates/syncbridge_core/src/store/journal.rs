//! Journal-backed record store.

use super::table::RecordTable;
use super::SyncRecordStore;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::record::{RecordId, SyncStatus, SynchronizationRecord};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::Path;
use syncbridge_storage::{FileBackend, Journal, JournalStats, StorageBackend};
use tracing::{debug, info};

/// Frame kind of a full record image.
pub const ENTRY_PUT: u8 = 1;
/// Frame kind of a record removal.
pub const ENTRY_DELETE: u8 = 2;
/// Frame kind carrying the next id to hand out, written by compaction.
const ENTRY_SEQUENCE: u8 = 3;

/// Size of the journal before and after a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Frames before compaction.
    pub frames_before: usize,
    /// Frames after compaction.
    pub frames_after: usize,
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes after compaction.
    pub bytes_after: u64,
}

#[derive(Debug)]
struct Inner<B: StorageBackend> {
    journal: Journal<B>,
    table: RecordTable,
    frames: usize,
}

/// Record store persisting every write as a CBOR frame in a [`Journal`].
///
/// Each write appends the complete new image of one record (or a removal)
/// and is synced before the call returns unless `sync_on_write` is off. The
/// in-memory index is rebuilt on open; the last image of an id wins and a
/// removal hides every earlier image.
#[derive(Debug)]
pub struct JournalRecordStore<B: StorageBackend> {
    inner: Mutex<Inner<B>>,
}

impl JournalRecordStore<FileBackend> {
    /// Opens or creates the journal file at `path` with an exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is locked, unreadable or damaged.
    pub fn open_path(path: &Path, config: &Config) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open(backend, config)
    }

    /// Opens the journal file at `path` for reading only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, locked for writing or damaged.
    pub fn open_read_only(path: &Path) -> CoreResult<Self> {
        let backend = FileBackend::open_shared(path)?;
        Self::open(backend, &Config::default())
    }
}

impl<B: StorageBackend> JournalRecordStore<B> {
    /// Opens a store over `backend` and replays its journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is damaged before its last frame or a
    /// frame does not decode.
    pub fn open(backend: B, config: &Config) -> CoreResult<Self> {
        let journal = Journal::open(backend)?.with_sync_on_append(config.sync_on_write);
        let mut table = RecordTable::new();
        let frames = journal.frames()?;

        for frame in &frames {
            match frame.kind {
                ENTRY_PUT => table.put(decode::<SynchronizationRecord>(&frame.body)?),
                ENTRY_DELETE => {
                    table.remove(decode::<RecordId>(&frame.body)?);
                }
                ENTRY_SEQUENCE => table.reserve(decode::<RecordId>(&frame.body)?),
                other => {
                    return Err(CoreError::corrupted(format!(
                        "Unknown journal entry kind {other} at offset {}.",
                        frame.offset
                    )))
                }
            }
        }

        debug!(frames = frames.len(), records = table.len(), "record store opened");
        Ok(Self {
            inner: Mutex::new(Inner {
                journal,
                table,
                frames: frames.len(),
            }),
        })
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// True if no record is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrites the journal so it holds one image per live record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend replace fails.
    pub fn compact(&self) -> CoreResult<CompactionStats> {
        let mut inner = self.inner.lock();
        let bytes_before = inner.journal.len();
        let frames_before = inner.frames;

        let mut bodies = Vec::with_capacity(inner.table.len() + 1);
        for record in inner.table.values() {
            bodies.push((ENTRY_PUT, encode(record)?));
        }
        bodies.push((ENTRY_SEQUENCE, encode(&inner.table.next_id())?));

        inner
            .journal
            .rewrite(bodies.iter().map(|(kind, body)| (*kind, body.as_slice())))?;
        inner.frames = bodies.len();

        let stats = CompactionStats {
            frames_before,
            frames_after: inner.frames,
            bytes_before,
            bytes_after: inner.journal.len(),
        };
        info!(
            frames_before = stats.frames_before,
            frames_after = stats.frames_after,
            bytes_after = stats.bytes_after,
            "record journal compacted"
        );
        Ok(stats)
    }

    /// Reports the health of the underlying journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn verify(&self) -> CoreResult<JournalStats> {
        Ok(self.inner.lock().journal.verify()?)
    }

    fn write(&self, inner: &mut Inner<B>, record: SynchronizationRecord) -> CoreResult<()> {
        inner.journal.append(ENTRY_PUT, &encode(&record)?)?;
        inner.frames += 1;
        inner.table.put(record);
        Ok(())
    }
}

impl<B: StorageBackend> SyncRecordStore for JournalRecordStore<B> {
    fn insert(&self, record: &SynchronizationRecord) -> CoreResult<Option<RecordId>> {
        let mut inner = self.inner.lock();
        let staged = inner.table.stage_insert(record);
        let id = staged.id;
        self.write(&mut inner, staged)?;
        Ok(id)
    }

    fn get(&self, id: RecordId) -> CoreResult<Option<SynchronizationRecord>> {
        Ok(self.inner.lock().table.get(id).cloned())
    }

    fn update_payload_and_status(
        &self,
        id: RecordId,
        payload: &JsonValue,
        status: &SyncStatus,
    ) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        let staged = inner.table.stage_payload_and_status(id, payload, status)?;
        self.write(&mut inner, staged)
    }

    fn update_status(
        &self,
        id: RecordId,
        status: &SyncStatus,
        message: Option<&str>,
        updated_at: u64,
    ) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        let staged = inner.table.stage_status(id, status, message, updated_at)?;
        self.write(&mut inner, staged)
    }

    fn delete(&self, id: RecordId) -> CoreResult<bool> {
        let mut inner = self.inner.lock();
        if !inner.table.contains(id) {
            return Ok(false);
        }
        inner.journal.append(ENTRY_DELETE, &encode(&id)?)?;
        inner.frames += 1;
        Ok(inner.table.remove(id))
    }

    fn all(&self) -> CoreResult<Vec<SynchronizationRecord>> {
        Ok(self.inner.lock().table.values().cloned().collect())
    }
}

fn encode<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::encoding(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::encoding(e.to_string()))
}
