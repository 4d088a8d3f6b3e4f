use std::fs::{
    create_dir_all,
    File,
    OpenOptions,
};
use std::io;
use std::io::{
    BufReader,
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;

use log::{
    error,
    info,
};
use thiserror::Error;

use crate::cache::Promise;
use crate::codec;
use crate::record::Record;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The file could be read but is not a valid record.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Any other filesystem failure.
    #[error("i/o failure: {0}")]
    Io(String),
}

impl StoreError {
    fn from_read(e: io::Error) -> StoreError {
        match e.kind() {
            io::ErrorKind::InvalidData => StoreError::Corrupt(e.to_string()),
            io::ErrorKind::UnexpectedEof => StoreError::Corrupt(e.to_string()),
            _ => StoreError::Io(e.to_string()),
        }
    }
}

/// Filesystem persistence of content records.
///
/// One flat directory, one file per record, filename equal to the record
/// key. The store is the only writer of that directory; creation uses an
/// exclusive open so a key can never be written twice.
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Open the store, creating the content directory if absent.
    pub fn new(dir: &Path) -> io::Result<ContentStore> {
        create_dir_all(dir)?;
        Ok(ContentStore {
            dir: PathBuf::from(dir),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the full record for a key. A missing file yields the empty
    /// sentinel; any other failure propagates.
    pub fn load(&self, key: &str) -> Result<Record, StoreError> {
        let path = self.dir.join(key);
        let f = match File::open(&path) {
            Ok(v) => v,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    return Ok(Record::empty());
                }
                return Err(StoreError::Io(e.to_string()));
            },
        };
        let mut r = BufReader::new(f);
        Record::decode(&mut r).map_err(StoreError::from_read)
    }

    /// Load everything but the body of the record at `path`. Sweeper use.
    pub fn load_meta(&self, path: &Path) -> Result<Record, StoreError> {
        let f = match File::open(path) {
            Ok(v) => v,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    return Ok(Record::empty());
                }
                return Err(StoreError::Io(e.to_string()));
            },
        };
        let mut r = BufReader::new(f);
        Record::decode_meta(&mut r).map_err(StoreError::from_read)
    }

    /// Persist a new record.
    ///
    /// The promise is resolved with the finished record before the disk
    /// write starts, so a reader holding the cache entry is served straight
    /// away. The file is then opened with an exclusive create; if the key
    /// already exists the write is logged and dropped.
    ///
    /// # Arguments
    ///
    /// * `key` - Key the record will be filed under.
    /// * `media_type` - Declared MIME type of the content.
    /// * `body` - Content body, gzipped by the caller unless `compress_first`.
    /// * `expiry` - Expiry instant in milliseconds since the epoch.
    /// * `compress_first` - Whether the body still needs gzipping here.
    /// * `promise` - Cache entry handle to resolve with the record.
    pub fn save(&self, key: &str, media_type: String, body: Vec<u8>, expiry: i64, compress_first: bool, promise: &Promise) {
        let body = match compress_first {
            true => {
                match codec::compress(&body) {
                    Ok(v) => v,
                    Err(e) => {
                        error!("compress {} failed: {}", key, e);
                        promise.resolve(Err(StoreError::Io(e.to_string())));
                        return;
                    },
                }
            },
            false => body,
        };

        let record = Arc::new(Record {
            key: String::from(key),
            media_type: media_type,
            expiry: expiry,
            body: body,
        });
        promise.resolve(Ok(record.clone()));

        let path = self.dir.join(key);
        let f = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(v) => v,
            Err(e) => {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    info!("file '{}' already exists", key);
                } else {
                    error!("cannot create {}: {}", key, e);
                }
                return;
            },
        };

        let mut w = BufWriter::new(f);
        let r = record.encode(&mut w).and_then(|_| w.flush());
        match r {
            Ok(_) => {},
            Err(e) => {
                error!("cannot write {}: {}", key, e);
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use std::fs::read;

    use env_logger;
    use tempfile::tempdir;

    use super::ContentStore;
    use crate::cache::Promise;
    use crate::codec;

    #[test]
    fn test_save_load() {
        let _ = env_logger::builder().is_test(true).try_init();
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let promise = Promise::new();
        store.save("abc1234", String::from("text/plain"), b"foobar".to_vec(), 1700000000000, true, &promise);

        let r = store.load("abc1234").unwrap();
        assert_eq!(r.key, "abc1234");
        assert_eq!(r.media_type, "text/plain");
        assert_eq!(r.expiry, 1700000000000);
        assert_eq!(codec::decompress(&r.body).unwrap(), b"foobar".to_vec());
    }

    #[test]
    fn test_save_resolves_before_disk() {
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let promise = Promise::new();
        store.save("abc1234", String::from("text/plain"), b"foobar".to_vec(), 1, true, &promise);

        let record = promise.wait().unwrap();
        assert_eq!(record.key, "abc1234");
        assert_eq!(codec::decompress(&record.body).unwrap(), b"foobar".to_vec());
    }

    #[test]
    fn test_missing_is_sentinel() {
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let r = store.load("nothere").unwrap();
        assert!(r.is_empty());
        assert!(r.body.is_empty());
    }

    #[test]
    fn test_create_once() {
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let promise = Promise::new();
        store.save("abc1234", String::from("text/plain"), b"first".to_vec(), 1, true, &promise);

        // the colliding save resolves its promise but never reaches disk
        let promise = Promise::new();
        store.save("abc1234", String::from("text/plain"), b"second".to_vec(), 1, true, &promise);
        let record = promise.wait().unwrap();
        assert_eq!(codec::decompress(&record.body).unwrap(), b"second".to_vec());

        let r = store.load("abc1234").unwrap();
        assert_eq!(codec::decompress(&r.body).unwrap(), b"first".to_vec());
    }

    #[test]
    fn test_precompressed_body_kept() {
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let z = codec::compress(b"foobar").unwrap();
        let promise = Promise::new();
        store.save("abc1234", String::from("text/plain"), z.clone(), 1, false, &promise);

        let r = store.load("abc1234").unwrap();
        assert_eq!(r.body, z);
    }

    #[test]
    fn test_compressible_body_shrinks() {
        let d = tempdir().unwrap();
        let store = ContentStore::new(d.path()).unwrap();

        let body = vec!(0u8; 1024 * 256);
        let promise = Promise::new();
        store.save("abc1234", String::from("application/octet-stream"), body.clone(), 1, true, &promise);

        let on_disk = read(d.path().join("abc1234")).unwrap();
        assert!(on_disk.len() < body.len());
    }
}
