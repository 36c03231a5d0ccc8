use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const TASKS_KEY: &str = "tasks";
pub const DARK_MODE_KEY: &str = "darkMode";

/// Durable keyed storage.
///
/// `load` of a key that was never saved is `Ok(None)`, not an error.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Moves a value that failed to parse out of the way so the next save
    /// does not overwrite it. Stores without durable state have nothing to
    /// keep.
    fn quarantine(&mut self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn load_json<T, S>(store: &S, key: &str) -> anyhow::Result<Option<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.load(key)? {
        Some(raw) => parse_json(key, &raw),
        None => Ok(None),
    }
}

/// Blank text counts as absent.
pub fn parse_json<T>(key: &str, raw: &str) -> anyhow::Result<Option<T>>
where
    T: DeserializeOwned,
{
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(raw).with_context(|| format!("failed parsing {key}"))?;
    Ok(Some(value))
}

pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let serialized =
        serde_json::to_string(value).with_context(|| format!("failed serializing {key}"))?;
    store.save(key, &serialized)
}

/// One file per key under `data_dir`.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.data"))
    }
}

impl KeyValueStore for DataStore {
    #[tracing::instrument(skip(self))]
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "loaded value");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value).with_context(|| format!("failed to save {key}"))
    }

    #[tracing::instrument(skip(self))]
    fn quarantine(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(());
        }
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let target = self.data_dir.join(format!("{key}.data.corrupt-{stamp}"));
        fs::rename(&path, &target).with_context(|| {
            format!(
                "failed moving {} to {}",
                path.display(),
                target.display()
            )
        })?;
        warn!(
            from = %path.display(),
            to = %target.display(),
            "quarantined unreadable data"
        );
        Ok(())
    }
}

#[tracing::instrument(skip(path, value))]
fn write_atomic(path: &Path, value: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = value.len(), "saving atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(value.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

/// In-process store with no durability.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn quarantine(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}
