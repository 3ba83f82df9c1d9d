//! Index snapshot persistence
//!
//! The snapshot (`index.snapshot`) stores the committed document set as of
//! the last checkpoint; the change log holds everything after it. The
//! inverted index is rebuilt from both on init, so the file carries no
//! postings.
//!
//! Layout: 4-byte magic `MSIX`, u32 LE format version, MessagePack payload.
//! Written atomically via temp + fsync + rename.

use mediasearch_core::IndexedDocument;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;

/// Magic bytes for index snapshots
const SNAPSHOT_MAGIC: &[u8; 4] = b"MSIX";
/// Current snapshot version
const SNAPSHOT_VERSION: u32 = 1;
/// Magic + version
const HEADER_LEN: usize = 8;

/// Serializable committed state
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Format version
    pub version: u32,
    /// Live documents, sorted by id
    pub documents: Vec<IndexedDocument>,
}

impl SnapshotData {
    /// Wrap a document set at the current format version
    pub fn new(documents: Vec<IndexedDocument>) -> Self {
        SnapshotData {
            version: SNAPSHOT_VERSION,
            documents,
        }
    }
}

/// Write a snapshot atomically (temp + rename), returning its size
///
/// With `fsync`, the temp file is synced before the rename.
pub fn write_snapshot(path: &Path, data: &SnapshotData, fsync: bool) -> io::Result<u64> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let payload = rmp_serde::to_vec(data)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("serialize error: {}", e)))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);

    let tmp_path = path.with_extension("snapshot.tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        if fsync {
            file.sync_all()?;
        }
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(buf.len() as u64)
}

/// Load a snapshot
///
/// Returns `Ok(None)` if the file does not exist. A malformed file is an
/// `InvalidData` error.
pub fn load_snapshot(path: &Path) -> io::Result<Option<SnapshotData>> {
    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if buf.len() < HEADER_LEN {
        return Err(invalid("snapshot too small"));
    }
    if &buf[0..4] != SNAPSHOT_MAGIC {
        return Err(invalid("bad snapshot magic"));
    }
    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(invalid(format!("unsupported snapshot version {}", version)));
    }
    let data: SnapshotData = rmp_serde::from_slice(&buf[HEADER_LEN..])
        .map_err(|e| invalid(format!("decode error: {}", e)))?;
    Ok(Some(data))
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotData {
        SnapshotData::new(vec![
            IndexedDocument::new("1", "Batman Begins", "A hero rises"),
            IndexedDocument::new("2", "Heat", ""),
            IndexedDocument::new("3", "Amélie", "Une jeune femme à Montmartre"),
        ])
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");

        let bytes = write_snapshot(&path, &sample(), true).unwrap();
        assert_eq!(bytes, std::fs::metadata(&path).unwrap().len());
        let loaded = load_snapshot(&path).unwrap().unwrap();

        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.documents, sample().documents);
    }

    #[test]
    fn test_snapshot_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");

        write_snapshot(&path, &SnapshotData::new(Vec::new()), false).unwrap();
        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert!(loaded.documents.is_empty());
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&tmp.path().join("index.snapshot"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");

        write_snapshot(&path, &sample(), true).unwrap();
        write_snapshot(
            &path,
            &SnapshotData::new(vec![IndexedDocument::named("9", "Up")]),
            true,
        )
        .unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert!(!path.with_extension("snapshot.tmp").exists());
    }

    #[test]
    fn test_bad_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00rest").unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_too_small() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");
        std::fs::write(&path, b"MSI").unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_unsupported_version() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");
        let mut buf = Vec::new();
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.extend_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, &buf).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_truncated_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.snapshot");
        write_snapshot(&path, &sample(), false).unwrap();

        let buf = std::fs::read(&path).unwrap();
        std::fs::write(&path, &buf[..buf.len() / 2]).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
