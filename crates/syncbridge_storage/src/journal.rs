//! Append-only journal of checksummed frames.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::frame::{scan, Frame};
use tracing::{debug, warn};

/// Summary produced by [`Journal::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Number of intact frames.
    pub frames: usize,
    /// Total size of the backend in bytes.
    pub total_bytes: u64,
    /// Bytes covered by intact frames.
    pub valid_bytes: u64,
    /// Description of the first damaged frame, if any.
    pub damage: Option<String>,
}

impl JournalStats {
    /// Returns true if every byte belongs to an intact frame.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.damage.is_none() && self.valid_bytes == self.total_bytes
    }
}

/// A journal of frames on top of a [`StorageBackend`].
///
/// Opening a journal walks every frame. A damaged final frame is the normal
/// result of a crash in the middle of an append and is cut off; damage
/// anywhere else is reported as an error.
#[derive(Debug)]
pub struct Journal<B: StorageBackend> {
    backend: B,
    valid_len: u64,
    sync_on_append: bool,
}

impl<B: StorageBackend> Journal<B> {
    /// Opens a journal, cutting a torn trailing frame if one is found.
    ///
    /// Read-only backends keep the torn bytes but never expose them.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame other than the last one is damaged.
    pub fn open(mut backend: B) -> StorageResult<Self> {
        let data = backend.read_all()?;
        let result = scan(&data);

        if let Some(damage) = result.damage {
            if !damage.is_tail() {
                return Err(damage.into_error());
            }
            warn!(
                offset = damage.offset(),
                dropped = data.len() as u64 - result.valid_len,
                "journal has a torn trailing frame, cutting it"
            );
            match backend.truncate(result.valid_len) {
                Ok(()) | Err(StorageError::ReadOnly) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(frames = result.frames.len(), bytes = result.valid_len, "journal opened");
        Ok(Self {
            backend,
            valid_len: result.valid_len,
            sync_on_append: true,
        })
    }

    /// Sets whether every append is followed by a sync.
    #[must_use]
    pub fn with_sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Appends one frame and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write or sync fails.
    pub fn append(&mut self, kind: u8, body: &[u8]) -> StorageResult<u64> {
        let bytes = Frame::encode(kind, body);
        let offset = self.backend.append(&bytes)?;
        if self.sync_on_append {
            self.backend.sync()?;
        }
        self.valid_len = offset + bytes.len() as u64;
        Ok(offset)
    }

    /// Reads every intact frame in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails or a frame is damaged.
    pub fn frames(&self) -> StorageResult<Vec<Frame>> {
        let data = self.backend.read_at(0, self.valid_len as usize)?;
        let result = scan(&data);
        match result.damage {
            Some(damage) => Err(damage.into_error()),
            None => Ok(result.frames),
        }
    }

    /// Replaces the journal content with `frames`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot replace its content.
    pub fn rewrite<'a, I>(&mut self, frames: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (u8, &'a [u8])>,
    {
        let mut buf = Vec::new();
        for (kind, body) in frames {
            buf.extend_from_slice(&Frame::encode(kind, body));
        }
        self.backend.replace(&buf)?;
        self.valid_len = buf.len() as u64;
        Ok(())
    }

    /// Walks the whole backend and reports its health without failing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend itself cannot be read.
    pub fn verify(&self) -> StorageResult<JournalStats> {
        let data = self.backend.read_all()?;
        let result = scan(&data);
        Ok(JournalStats {
            frames: result.frames.len(),
            total_bytes: data.len() as u64,
            valid_bytes: result.valid_len,
            damage: result.damage.map(|d| d.into_error().to_string()),
        })
    }

    /// Makes every appended frame durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend sync fails.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.backend.sync()
    }

    /// Returns the number of bytes covered by intact frames.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.valid_len
    }

    /// Returns true if the journal holds no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FRAME_OVERHEAD;
    use crate::InMemoryBackend;
    use proptest::prelude::*;

    #[test]
    fn append_and_read_back() {
        let mut journal = Journal::open(InMemoryBackend::new()).unwrap();
        assert!(journal.is_empty());

        journal.append(1, b"put").unwrap();
        let offset = journal.append(2, b"delete").unwrap();
        assert_eq!(offset, (FRAME_OVERHEAD + 3) as u64);

        let frames = journal.frames().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].kind, 2);
        assert_eq!(frames[1].body, b"delete");
    }

    #[test]
    fn open_cuts_torn_tail() {
        let mut data = Frame::encode(1, b"complete");
        let torn = Frame::encode(1, b"incomplete");
        data.extend_from_slice(&torn[..6]);

        let journal = Journal::open(InMemoryBackend::with_data(data)).unwrap();
        assert_eq!(journal.frames().unwrap().len(), 1);
        assert_eq!(journal.backend().size().unwrap(), journal.len());
    }

    #[test]
    fn open_refuses_mid_file_damage() {
        let mut data = Frame::encode(1, b"first");
        data[5] ^= 0x01;
        data.extend_from_slice(&Frame::encode(1, b"second"));

        let result = Journal::open(InMemoryBackend::with_data(data));
        assert!(matches!(result, Err(StorageError::ChecksumMismatch { .. })));
    }

    #[test]
    fn verify_reports_damage_without_failing() {
        let mut data = Frame::encode(1, b"first");
        data.extend_from_slice(&[1, 2, 3]);
        let backend = InMemoryBackend::with_data(data.clone());

        let journal = Journal {
            backend,
            valid_len: (FRAME_OVERHEAD + 5) as u64,
            sync_on_append: false,
        };
        let stats = journal.verify().unwrap();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.total_bytes, data.len() as u64);
        assert!(!stats.is_clean());
        assert!(stats.damage.is_some());
    }

    #[test]
    fn rewrite_replaces_frames() {
        let mut journal = Journal::open(InMemoryBackend::new()).unwrap();
        journal.append(1, b"a").unwrap();
        journal.append(1, b"b").unwrap();
        journal.append(1, b"c").unwrap();

        let keep: Vec<u8> = b"c".to_vec();
        journal.rewrite([(1u8, keep.as_slice())]).unwrap();

        let frames = journal.frames().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, 0);
        assert!(journal.verify().unwrap().is_clean());
    }

    proptest! {
        #[test]
        fn any_truncation_recovers_a_prefix(
            bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..8),
            cut in 0usize..64,
        ) {
            let mut data = Vec::new();
            for body in &bodies {
                data.extend_from_slice(&Frame::encode(1, body));
            }
            let keep = data.len().saturating_sub(cut);
            data.truncate(keep);

            let journal = Journal::open(InMemoryBackend::with_data(data)).unwrap();
            let frames = journal.frames().unwrap();
            prop_assert!(frames.len() <= bodies.len());
            for (frame, body) in frames.iter().zip(&bodies) {
                prop_assert_eq!(&frame.body, body);
            }
        }
    }
}
