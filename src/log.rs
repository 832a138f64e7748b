//! Append-only mutation log backing durable stores.
//!
//! Each entry records the resolved outcome of one write (the document as
//! stored, or its deletion), so replay never re-derives ids or timestamps.

use crate::error::{Result, StoreError};
use crate::types::{Document, DocumentPath, Sequence, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for log entries.
const LOG_MAGIC: &[u8; 4] = b"DOC\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Entry header: magic, version, flags, sequence, timestamp, payload length.
const HEADER_LEN: usize = 4 + 1 + 1 + 8 + 8 + 4;

/// Largest payload a single entry may carry.
const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// A single write, as applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// The document now has exactly this content.
    Put {
        path: DocumentPath,
        document: Document,
    },
    /// The document no longer exists.
    Delete { path: DocumentPath },
}

impl Mutation {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Mutation::Put { path, .. } | Mutation::Delete { path } => path,
        }
    }
}

/// A decoded log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub sequence: Sequence,
    pub timestamp: Timestamp,
    pub mutation: Mutation,
}

struct LogFile {
    file: File,
    size: u64,
    writes_since_sync: u64,
}

/// Append-only mutation log.
pub struct MutationLog {
    path: PathBuf,
    inner: Mutex<LogFile>,
    /// Sync every N writes.
    sync_interval: u64,
}

impl MutationLog {
    /// Default sync interval - sync every 100 writes.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a mutation log.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = N: sync every N writes
    pub fn open(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            inner: Mutex::new(LogFile {
                file,
                size,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append a mutation. Returns the offset it was written at.
    pub fn append(&self, sequence: Sequence, mutation: &Mutation) -> Result<u64> {
        let payload = rmp_serde::to_vec_named(mutation)?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(StoreError::Serialization("mutation too large".into()));
        }
        let payload_len = payload.len() as u32;

        let mut entry = Vec::with_capacity(payload.len() + 30);
        entry.extend_from_slice(LOG_MAGIC);
        entry.push(LOG_VERSION);
        // Flags (reserved)
        entry.push(0u8);
        entry.extend_from_slice(&sequence.0.to_le_bytes());
        entry.extend_from_slice(&Timestamp::now().0.to_le_bytes());
        entry.extend_from_slice(&payload_len.to_le_bytes());
        entry.extend_from_slice(&payload);
        entry.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        let mut inner = self.inner.lock();
        let offset = inner.size;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&entry)?;
        inner.size = offset + entry.len() as u64;

        inner.writes_since_sync += 1;
        if inner.writes_since_sync >= self.sync_interval {
            inner.file.sync_all()?;
            inner.writes_since_sync = 0;
        }

        Ok(offset)
    }

    /// Read every entry from the start of the log.
    ///
    /// A torn final entry (left by a crash mid-write) ends the replay and is
    /// cut off so later appends start on a clean boundary. A checksum
    /// mismatch anywhere is reported as an error.
    pub fn replay(&self) -> Result<Vec<LogEntry>> {
        let mut inner = self.inner.lock();
        inner.file.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut offset = 0u64;
        loop {
            if offset == inner.size {
                break;
            }
            let remaining = inner.size - offset;
            match Self::read_entry(&mut inner.file, remaining) {
                Ok((entry, len)) => {
                    entries.push(entry);
                    offset += len;
                }
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!(
                        path = %self.path.display(),
                        offset,
                        "truncating torn entry at end of mutation log"
                    );
                    inner.file.set_len(offset)?;
                    inner.size = offset;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(entries = entries.len(), "mutation log replayed");
        Ok(entries)
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.sync_all()?;
        inner.writes_since_sync = 0;
        Ok(())
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one entry at the current position. Returns it with its length.
    ///
    /// An entry running past `remaining` bytes reads as `UnexpectedEof`.
    fn read_entry(file: &mut File, remaining: u64) -> Result<(LogEntry, u64)> {
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header)?;

        if &header[0..4] != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid log entry magic".into()));
        }
        if header[4] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                header[4]
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&header[6..14]);
        let sequence = Sequence(u64::from_le_bytes(word));
        word.copy_from_slice(&header[14..22]);
        let timestamp = Timestamp(i64::from_le_bytes(word));
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[22..26]);
        let payload_len = u32::from_le_bytes(len_bytes) as usize;

        if payload_len > MAX_PAYLOAD_LEN {
            return Err(StoreError::InvalidFormat(format!(
                "Log entry length {} exceeds limit",
                payload_len
            )));
        }
        if (HEADER_LEN + payload_len + 4) as u64 > remaining {
            return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
        }

        let mut payload = vec![0u8; payload_len];
        file.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let expected = u32::from_le_bytes(checksum_bytes);
        let got = crc32fast::hash(&payload);
        if expected != got {
            return Err(StoreError::ChecksumMismatch { expected, got });
        }

        let mutation: Mutation = rmp_serde::from_slice(&payload)?;
        let len = (HEADER_LEN + payload_len + 4) as u64;

        Ok((
            LogEntry {
                sequence,
                timestamp,
                mutation,
            },
            len,
        ))
    }
}
