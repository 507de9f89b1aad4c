// File-backed key-value store. Each entry is one file under the state
// directory, named by a namespace prefix plus the percent-encoded key, so
// keys survive round trips through arbitrary module names and URLs.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;

pub struct KvStore {
    root: PathBuf,
    // Serializes directory access; the store is shared across tasks.
    lock: Mutex<()>,
}

impl KvStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create state dir {}", root.display()))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn entry_path(&self, prefix: &str, key: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", prefix, urlencoding::encode(key)))
    }

    /// Store `value` under `prefix` + `key`, replacing any previous value.
    pub fn put(&self, prefix: &str, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let path = self.entry_path(prefix, key);
        fs::write(&path, value).with_context(|| format!("write {}", path.display()))
    }

    /// Fetch the value stored under `prefix` + `key`, if any.
    pub fn get(&self, prefix: &str, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        let path = self.entry_path(prefix, key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, prefix: &str, key: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let path = self.entry_path(prefix, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    /// Decoded keys currently stored under `prefix`, sorted.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let _guard = self.lock.lock();
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("list state dir {}", self.root.display()))?
        {
            let file_name = entry?.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(encoded) = name.strip_prefix(prefix) else {
                continue;
            };
            if let Ok(key) = urlencoding::decode(encoded) {
                keys.push(key.into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Remove every entry under `prefix`. Returns how many were removed.
    pub fn clear(&self, prefix: &str) -> Result<usize> {
        let _guard = self.lock.lock();
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("list state dir {}", self.root.display()))?
        {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(prefix) {
                fs::remove_file(entry.path())
                    .with_context(|| format!("remove {}", entry.path().display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
