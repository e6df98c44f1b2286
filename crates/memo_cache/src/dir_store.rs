//! Directory-backed record storage.
//!
//! Each record is one file `<dir>/<key>.<ext>`: a 4-byte little-endian
//! header length, a bincode header carrying magic bytes, the file format
//! version, the record's version tag, a checksum and a compression flag,
//! then the payload. The version tag can be read without touching the
//! payload.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use memo_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::path::expand_path;
use crate::store::{validate_key, ReadOutcome, Store};

/// Magic bytes identifying a memo record file.
const RECORD_MAGIC: [u8; 4] = *b"MEMO";

/// Current record file format version. Increment on breaking changes to
/// the header or payload layout.
const RECORD_FORMAT_VERSION: u32 = 1;

/// File extension used unless overridden.
pub const DEFAULT_EXTENSION: &str = "memo";

/// Header prepended to every record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Magic bytes: must be `b"MEMO"`.
    pub magic: [u8; 4],

    /// Record file format version.
    pub format_version: u32,

    /// Version tag of the function that wrote the record.
    pub version: String,

    /// Content hash of the stored payload bytes.
    pub checksum: ContentHash,

    /// Whether the stored payload is gzip-compressed.
    pub compressed: bool,
}

/// A [`Store`] keeping one file per record in a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    ext: String,
    compress: bool,
}

impl DirStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ext: DEFAULT_EXTENSION.to_string(),
            compress: false,
        }
    }

    /// Creates a store at `location` after expanding `!`, `~` and `.`.
    pub fn open(location: &str) -> Result<Self, CacheError> {
        Ok(Self::new(&expand_path(location)?))
    }

    /// Uses `ext` as the record file extension.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.ext = ext.trim_start_matches('.').to_string();
        self
    }

    /// Enables or disables gzip compression of written payloads.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// A store for the subdirectory `name`, with the same settings.
    pub fn sub(&self, name: &str) -> Result<Self, CacheError> {
        validate_key(name)?;
        Ok(Self {
            dir: self.dir.join(name),
            ..self.clone()
        })
    }

    /// The store's directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file path of the record under `key`.
    ///
    /// Fails with [`CacheError::InvalidKey`] for keys that could name a file
    /// outside the directory.
    pub fn record_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        Ok(self.file_for(key))
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{}", self.ext))
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))
    }

    /// Reads the whole record file; `None` if it does not exist.
    fn load(&self, key: &str) -> Result<Option<(RecordHeader, Vec<u8>)>, CacheError> {
        let path = self.record_path(key)?;
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let (header, offset) = decode_header(&path, &raw)?;
        Ok(Some((header, raw[offset..].to_vec())))
    }

    fn read_header_only(&self, key: &str) -> Result<RecordHeader, CacheError> {
        let path = self.record_path(key)?;
        let mut file = File::open(&path).map_err(|e| CacheError::io(&path, e))?;
        let mut len = [0u8; 4];
        file.read_exact(&mut len)
            .map_err(|e| CacheError::io(&path, e))?;
        let header_len = u32::from_le_bytes(len) as usize;
        let file_len = file
            .metadata()
            .map_err(|e| CacheError::io(&path, e))?
            .len();
        if (4 + header_len) as u64 > file_len {
            return Err(CacheError::InvalidHeader {
                path,
                reason: "truncated header".to_string(),
            });
        }
        let mut raw = vec![0u8; 4 + header_len];
        raw[..4].copy_from_slice(&len);
        file.read_exact(&mut raw[4..])
            .map_err(|e| CacheError::io(&path, e))?;
        Ok(decode_header(&path, &raw)?.0)
    }
}

fn decode_header(path: &Path, raw: &[u8]) -> Result<(RecordHeader, usize), CacheError> {
    let invalid = |reason: String| CacheError::InvalidHeader {
        path: path.to_path_buf(),
        reason,
    };
    let Some(len_bytes) = raw.get(..4) else {
        return Err(invalid("file too short for header length".to_string()));
    };
    let mut len = [0u8; 4];
    len.copy_from_slice(len_bytes);
    let header_len = u32::from_le_bytes(len) as usize;
    let Some(header_bytes) = raw.get(4..4 + header_len) else {
        return Err(invalid("truncated header".to_string()));
    };
    let header: RecordHeader =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| invalid(e.to_string()))?
            .0;
    if header.magic != RECORD_MAGIC {
        return Err(invalid("missing magic bytes".to_string()));
    }
    if header.format_version != RECORD_FORMAT_VERSION {
        return Err(CacheError::FormatMismatch {
            path: path.to_path_buf(),
            expected: RECORD_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    Ok((header, 4 + header_len))
}

fn compress(path: &Path, payload: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| CacheError::io(path, e))?;
    encoder.finish().map_err(|e| CacheError::io(path, e))
}

fn decompress(path: &Path, body: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(|e| CacheError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("compressed payload is unreadable: {e}"),
        })?;
    Ok(out)
}

impl Store for DirStore {
    fn exists(&self, key: &str) -> bool {
        self.record_path(key).is_ok_and(|path| path.is_file())
    }

    fn read_version(&self, key: &str) -> Option<String> {
        self.read_header_only(key).ok().map(|h| h.version)
    }

    fn read(
        &self,
        key: &str,
        expected_version: &str,
        delete_mismatch: bool,
    ) -> Result<ReadOutcome, CacheError> {
        let Some((header, body)) = self.load(key)? else {
            return Ok(ReadOutcome::Missing);
        };
        if header.version != expected_version {
            if delete_mismatch {
                self.delete(key)?;
            }
            return Ok(ReadOutcome::VersionMismatch {
                stored: header.version,
                deleted: delete_mismatch,
            });
        }

        let path = self.file_for(key);
        if !header.checksum.matches(&body) {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: ContentHash::from_bytes(&body).to_string(),
            });
        }
        let payload = if header.compressed {
            decompress(&path, &body)?
        } else {
            body
        };
        Ok(ReadOutcome::Hit(payload))
    }

    fn write(&self, key: &str, payload: &[u8], version: &str) -> Result<(), CacheError> {
        let path = self.record_path(key)?;
        self.ensure_dir()?;

        let body = if self.compress {
            compress(&path, payload)?
        } else {
            payload.to_vec()
        };
        let header = RecordHeader {
            magic: RECORD_MAGIC,
            format_version: RECORD_FORMAT_VERSION,
            version: version.to_string(),
            checksum: ContentHash::from_bytes(&body),
            compressed: self.compress,
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + body.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&body);

        // Readers never see a half-written record; the last rename wins.
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::io(&self.dir, e))?;
        tmp.write_all(&output)
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| CacheError::io(path, e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let path = self.record_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&self.dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(self.ext.as_str()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn full_key_name(&self, key: &str) -> String {
        self.file_for(key).display().to_string()
    }
}
