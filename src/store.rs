// src/store.rs
//! Narrow key-value persistence boundary. The pipeline only ever touches
//! storage through these two calls, so hosts can plug in whatever backs them.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> io::Result<()>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().expect("store mutex poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> io::Result<()> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One file per key under a data directory. Writes go through a temp file
/// and rename so a crash never leaves a half-written value behind.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = fs::create_dir_all(&dir); // best-effort
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

impl AsRef<Path> for FileStore {
    fn as_ref(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_none());
        store.set("k", b"value").unwrap();
        assert_eq!(store.get("k").as_deref(), Some(&b"value"[..]));
        store.set("k", b"updated").unwrap();
        assert_eq!(store.get("k").as_deref(), Some(&b"updated"[..]));
    }

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get("brief.archive").is_none());
        store.set("brief.archive", b"[1]").unwrap();
        assert_eq!(store.get("brief.archive").as_deref(), Some(&b"[1]"[..]));
        store.set("brief.archive", b"[1,2]").unwrap();
        assert_eq!(store.get("brief.archive").as_deref(), Some(&b"[1,2]"[..]));
        // no stray temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
