//! Filesystem layout for the advanced cache
//!
//! Provides a `CacheStore` that owns a cache root directory holding the
//! version marker file and a data subdirectory of raw JSON response bodies.

use directories::ProjectDirs;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::version::VersionToken;

/// Default name of the subdirectory holding cached response bodies
pub const DEFAULT_DATA_DIR_NAME: &str = "data";

/// Default name of the version marker file
pub const DEFAULT_VERSION_FILE_NAME: &str = "last_modified.txt";

/// Environment variable overriding the default cache root
pub const CACHE_DIR_ENV: &str = "POSTEASE_CACHE_DIR";

/// Errors raised by filesystem operations on the cache
#[derive(Debug, Error)]
pub enum StorageError {
    /// A cache directory could not be created
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cache file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cache file could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bulk deletion left files behind
    #[error("Failed to remove {failed} cache entries (first: {path}): {source}")]
    Clear {
        failed: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the cache lives on disk
///
/// Only the root is configurable as a path. The data directory and the
/// version marker are always joined onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    root: PathBuf,
    data_dir_name: String,
    version_file_name: String,
}

impl CacheConfig {
    /// Creates a config rooted at `root` with the default file names
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            data_dir_name: DEFAULT_DATA_DIR_NAME.to_string(),
            version_file_name: DEFAULT_VERSION_FILE_NAME.to_string(),
        }
    }

    /// Creates a config under the XDG-compliant cache directory
    ///
    /// `POSTEASE_CACHE_DIR` wins when set. Returns `None` if no cache
    /// directory can be determined (e.g., no home directory).
    pub fn from_default_dir() -> Option<Self> {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(Self::new(PathBuf::from(dir)));
        }
        let project_dirs = ProjectDirs::from("", "", "postease")?;
        Some(Self::new(project_dirs.cache_dir()))
    }

    /// Overrides the data subdirectory name
    pub fn with_data_dir_name(mut self, name: impl Into<String>) -> Self {
        self.data_dir_name = name.into();
        self
    }

    /// Overrides the version marker file name
    pub fn with_version_file_name(mut self, name: impl Into<String>) -> Self {
        self.version_file_name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `<key>.json` entries
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.data_dir_name)
    }

    /// File holding the local version token
    pub fn version_path(&self) -> PathBuf {
        self.root.join(&self.version_file_name)
    }
}

/// Reads and writes the version marker and cached response bodies
#[derive(Debug, Clone)]
pub struct CacheStore {
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the path to the entry file for the given key
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.config.data_dir().join(format!("{}.json", key))
    }

    /// Ensures the root and data directories exist
    ///
    /// Safe to call on every startup.
    pub fn initialize(&self) -> Result<(), StorageError> {
        for dir in [self.config.root.clone(), self.config.data_dir()] {
            fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Reads the persisted version token
    ///
    /// # Returns
    /// * `Ok(Some(token))` if the marker exists and holds a token
    /// * `Ok(None)` if the marker is missing or blank
    /// * `Err` on any other I/O failure
    pub fn read_local_version(&self) -> Result<Option<VersionToken>, StorageError> {
        let path = self.config.version_path();
        match fs::read_to_string(&path) {
            Ok(content) => Ok(VersionToken::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    /// Persists the version token, replacing any previous value
    pub fn write_local_version(&self, token: &VersionToken) -> Result<(), StorageError> {
        let path = self.config.version_path();
        write_atomically(&path, token.as_str().as_bytes())
    }

    /// Deletes every file in the data directory
    ///
    /// Keeps going after a failed deletion and reports how many files were
    /// left behind. A missing or empty directory is not an error.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of files removed
    /// * `Err(StorageError::Clear)` if any file could not be removed
    pub fn clear_all_entries(&self) -> Result<usize, StorageError> {
        self.clear_entries_with(|path| fs::remove_file(path))
    }

    /// Clears the data directory, deleting each file with `remove`
    fn clear_entries_with<F>(&self, mut remove: F) -> Result<usize, StorageError>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let data_dir = self.config.data_dir();
        let entries = match fs::read_dir(&data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StorageError::Read {
                    path: data_dir,
                    source,
                })
            }
        };

        let mut removed = 0;
        let mut failed = 0;
        let mut first_failure: Option<(PathBuf, io::Error)> = None;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    failed += 1;
                    first_failure.get_or_insert((data_dir.clone(), e));
                    continue;
                }
            };
            if path.is_dir() {
                debug!(path = %path.display(), "skipping directory in cache data dir");
                continue;
            }
            match remove(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove cache entry");
                    failed += 1;
                    first_failure.get_or_insert((path, e));
                }
            }
        }

        match first_failure {
            None => Ok(removed),
            Some((path, source)) => Err(StorageError::Clear {
                failed,
                path,
                source,
            }),
        }
    }

    /// Reads a cached response body
    ///
    /// Returns `Ok(None)` on a miss.
    pub fn read_entry(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    /// Creates or overwrites the entry for `key`
    pub fn write_entry(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StorageError> {
        write_atomically(&self.entry_path(key), bytes)
    }

    /// Counts the entry files currently stored
    pub fn entry_count(&self) -> Result<usize, StorageError> {
        let data_dir = self.config.data_dir();
        match fs::read_dir(&data_dir) {
            Ok(entries) => Ok(entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                .count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(source) => Err(StorageError::Read {
                path: data_dir,
                source,
            }),
        }
    }
}

/// Writes through a temp file in the target's directory, then renames it
/// into place so readers never observe a partial file
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let to_write_error = |source: io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).map_err(to_write_error)?;
    temp.write_all(bytes).map_err(to_write_error)?;
    temp.persist(path).map_err(|e| to_write_error(e.error))?;
    Ok(())
}
