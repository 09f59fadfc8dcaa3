//! Persistence for the last successfully searched city.
//!
//! A single string, last write wins, no expiry.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{fs, io, path::PathBuf};

use crate::config::project_dirs;

pub trait LastCityStore: Send + Sync + std::fmt::Debug {
    fn load_last_city(&self) -> Result<Option<String>>;
    fn save_last_city(&self, name: &str) -> Result<()>;
}

/// Stores the city in a plain text file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `last_city` under the platform data directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(project_dirs()?.data_dir().join("last_city")))
    }
}

impl LastCityStore for FileStore {
    fn load_last_city(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read last city: {}", self.path.display())),
        }
    }

    fn save_last_city(&self, name: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        fs::write(&self.path, name)
            .with_context(|| format!("Failed to write last city: {}", self.path.display()))
    }
}

/// Keeps the city for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_city(name: &str) -> Self {
        Self {
            value: Mutex::new(Some(name.to_string())),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

impl LastCityStore for MemoryStore {
    fn load_last_city(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn save_last_city(&self, name: &str) -> Result<()> {
        *self.value.lock() = Some(name.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }
}
