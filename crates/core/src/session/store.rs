use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use snafu::Snafu;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("durable storage is unavailable on `{stage}`: {details}"))]
    Unavailable {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to create storage directory at {path:?}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read storage file {path:?}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to write storage file {path:?}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to rename temporary storage file {from:?} to {to:?}"))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode storage contents on `{stage}`"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

/// Durable, per-origin string storage.
///
/// Mirrors the browser's `localStorage` contract: a missing key is `Ok(None)`,
/// not an error.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use snafu::ResultExt;

    use super::{
        CreateDirSnafu, EncodeSnafu, KeyValueStore, ReadFileSnafu, RenameTempFileSnafu,
        StoreResult, WriteFileSnafu,
    };

    /// JSON object on disk, rewritten atomically through a temp file.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        fn load(&self) -> StoreResult<BTreeMap<String, String>> {
            if !self.path.exists() {
                return Ok(BTreeMap::new());
            }

            let content = std::fs::read_to_string(&self.path).context(ReadFileSnafu {
                stage: "read-storage-file",
                path: self.path.clone(),
            })?;

            match serde_json::from_str(&content) {
                Ok(entries) => Ok(entries),
                Err(error) => {
                    tracing::warn!(
                        path = ?self.path,
                        error = %error,
                        "storage file is not a string map; starting empty"
                    );
                    Ok(BTreeMap::new())
                }
            }
        }

        fn persist(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent).context(CreateDirSnafu {
                    stage: "create-storage-directory",
                    path: parent.to_path_buf(),
                })?;
            }

            let content = serde_json::to_string_pretty(entries).context(EncodeSnafu {
                stage: "serialize-storage-json",
            })?;

            let temp_path = self.path.with_extension("json.tmp");
            std::fs::write(&temp_path, content).context(WriteFileSnafu {
                stage: "write-temporary-storage-file",
                path: temp_path.clone(),
            })?;

            std::fs::rename(&temp_path, &self.path).context(RenameTempFileSnafu {
                stage: "rename-temporary-storage-file",
                from: temp_path,
                to: self.path.clone(),
            })?;

            Ok(())
        }
    }

    impl KeyValueStore for FileStore {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            Ok(self.load()?.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            let mut entries = self.load()?;
            entries.insert(key.to_string(), value.to_string());
            self.persist(&entries)
        }
    }
}
