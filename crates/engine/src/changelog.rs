//! Append-only change log (`index.log`)
//!
//! A commit that changed the index appends one record holding the batch's
//! effective changes, so the cost of persisting a commit tracks the batch,
//! not the corpus. The snapshot is rewritten only when the log is compacted
//! into it.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ magic "MSLG" │ version u32 LE│  header, 8 bytes
//! ├──────────────────────────────┤
//! │ Record 1                     │
//! ├──────────────────────────────┤
//! │ ...                          │
//! └──────────────────────────────┘
//!
//! Record:
//! ┌──────────────────┬──────────────────────────┬──────────────┐
//! │ Length u32 LE    │ MessagePack `LogRecord`  │ CRC32 u32 LE │
//! └──────────────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! A short or checksum-failing record ends replay: it is the tail of a write
//! that never completed.

use mediasearch_core::{DocId, IndexedDocument};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for change logs
const LOG_MAGIC: &[u8; 4] = b"MSLG";
/// Current log format version
const LOG_VERSION: u32 = 1;
/// Magic + version
const HEADER_LEN: u64 = 8;
/// Length prefix + CRC32
const FRAME_OVERHEAD: usize = 8;

/// Effective changes of one commit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Generation of the commit
    pub generation: u64,
    /// Documents indexed or replaced, in apply order
    pub upserts: Vec<IndexedDocument>,
    /// Ids removed, in apply order
    pub removed: Vec<DocId>,
}

impl LogRecord {
    /// True if the record changes nothing
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

/// Records read back from a log
#[derive(Debug, Default)]
pub struct Replay {
    /// Complete records, oldest first
    pub records: Vec<LogRecord>,
    /// True if trailing bytes did not form a complete record
    pub torn_tail: bool,
}

/// Writable handle on the change log
#[derive(Debug)]
pub struct ChangeLog {
    path: PathBuf,
    file: File,
    fsync: bool,
    records: usize,
    bytes: u64,
}

impl ChangeLog {
    /// Start an empty log at `path`, replacing whatever was there
    pub fn create(path: impl Into<PathBuf>, fsync: bool) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut log = ChangeLog {
            path,
            file,
            fsync,
            records: 0,
            bytes: 0,
        };
        log.write_header()?;
        Ok(log)
    }

    fn write_header(&mut self) -> io::Result<()> {
        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(LOG_MAGIC);
        header[4..8].copy_from_slice(&LOG_VERSION.to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        if self.fsync {
            self.file.sync_data()?;
        }
        self.bytes = HEADER_LEN;
        Ok(())
    }

    /// Append one record
    ///
    /// With `fsync`, the record is on disk when this returns.
    pub fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        let payload = rmp_serde::to_vec(record)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("serialize error: {}", e)))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "log record too large"))?;

        let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        self.file.seek(SeekFrom::Start(self.bytes))?;
        self.file.write_all(&frame)?;
        if self.fsync {
            self.file.sync_data()?;
        }
        self.bytes += frame.len() as u64;
        self.records += 1;
        Ok(())
    }

    /// Drop every record; called once the snapshot covers them
    pub fn reset(&mut self) -> io::Result<()> {
        self.file.set_len(HEADER_LEN)?;
        self.write_header()?;
        self.records = 0;
        Ok(())
    }

    /// Records appended since the last reset
    pub fn records(&self) -> usize {
        self.records
    }

    /// Current file length in bytes
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every complete record
///
/// Returns `Ok(None)` if the file does not exist. A bad header is an
/// `InvalidData` error; a bad tail is reported through `Replay::torn_tail`.
pub fn read_log(path: &Path) -> io::Result<Option<Replay>> {
    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let header_len = HEADER_LEN as usize;
    if buf.len() < header_len {
        return Err(invalid("log too small"));
    }
    if &buf[0..4] != LOG_MAGIC {
        return Err(invalid("bad log magic"));
    }
    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != LOG_VERSION {
        return Err(invalid(format!("unsupported log version {}", version)));
    }

    let mut replay = Replay::default();
    let mut pos = header_len;
    while pos < buf.len() {
        match read_frame(&buf[pos..]) {
            Some((record, used)) => {
                replay.records.push(record);
                pos += used;
            }
            None => {
                replay.torn_tail = true;
                break;
            }
        }
    }
    Ok(Some(replay))
}

/// Decode one frame, returning the record and the bytes it used
fn read_frame(buf: &[u8]) -> Option<(LogRecord, usize)> {
    let len = u32::from_le_bytes(buf.get(0..4)?.try_into().ok()?) as usize;
    let payload = buf.get(4..4 + len)?;
    let crc_bytes = buf.get(4 + len..4 + len + 4)?;
    let stored_crc = u32::from_le_bytes(crc_bytes.try_into().ok()?);
    if crc32fast::hash(payload) != stored_crc {
        return None;
    }
    let record = rmp_serde::from_slice(payload).ok()?;
    Some((record, len + FRAME_OVERHEAD))
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

// ============================================================================
// Tests
// ============================================================================
