// client/src/storage.rs
//! Durable client-side state: the verified session, preview identity, the
//! demo-mode flag and locally seen vote / check-in ids.
//!
//! Reads never fail. Anything missing, partial or malformed comes back as
//! absent (or empty) and is logged.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use common::{PreviewIdentity, Role, Session};

const KEY_JWT: &str = "algocampus.jwt";
const KEY_ROLE: &str = "algocampus.role";
const KEY_ADDRESS: &str = "algocampus.address";
const KEY_DEMO_MODE: &str = "algocampus.demoMode";
const KEY_VOTES: &str = "algocampus.localVotes";
const KEY_CHECKINS: &str = "algocampus.localCheckins";
const KEY_PREVIEW_ROLE: &str = "algocampus.preview.role";
const KEY_PREVIEW_ENABLED: &str = "algocampus.preview.enabled";

/// Flat string key-value persistence. The batch operations apply all of
/// their keys or none of them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
    fn set_many(&self, entries: &[(&str, &str)]) -> io::Result<()>;
    fn remove_many(&self, keys: &[&str]) -> io::Result<()>;
}

/// Process-local store, used in tests and for ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> io::Result<()> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> io::Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}

/// All keys in one JSON object on disk. Writes go through a sibling temp
/// file and a rename so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e),
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!("Ignoring corrupt store file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(map).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }

    fn update<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut map = self.read_all()?;
        f(&mut map);
        self.write_all(&map)
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> io::Result<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> io::Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

/// Typed view over a [`KeyValueStore`] with the namespaced campus keys.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileKvStore::new(path)))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} from session store: {}", key, e);
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Ignoring malformed {}: {}", key, e);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> io::Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.backend.set(key, &raw)
    }

    /// Persisted session, or `None` unless all three parts are present and valid.
    pub fn load_session(&self) -> Option<Session> {
        let token = self.read(KEY_JWT);
        let role = self.read(KEY_ROLE).and_then(|r| r.parse::<Role>().ok());
        let address = self.read(KEY_ADDRESS);
        Session::from_parts(token, role, address)
    }

    pub fn save_session(&self, session: &Session) -> io::Result<()> {
        self.backend.set_many(&[
            (KEY_JWT, session.token.as_str()),
            (KEY_ROLE, session.role.as_str()),
            (KEY_ADDRESS, session.address.as_str()),
        ])
    }

    pub fn clear_session(&self) -> io::Result<()> {
        self.backend.remove_many(&[KEY_JWT, KEY_ROLE, KEY_ADDRESS])
    }

    pub fn demo_mode(&self) -> bool {
        self.read(KEY_DEMO_MODE).as_deref() == Some("1")
    }

    pub fn set_demo_mode(&self, enabled: bool) -> io::Result<()> {
        self.backend.set(KEY_DEMO_MODE, if enabled { "1" } else { "0" })
    }

    pub fn local_votes(&self) -> BTreeSet<u64> {
        self.read_json(KEY_VOTES).unwrap_or_default()
    }

    pub fn mark_local_vote(&self, poll_id: u64) -> io::Result<()> {
        let mut votes = self.local_votes();
        votes.insert(poll_id);
        self.write_json(KEY_VOTES, &votes)
    }

    pub fn local_checkins(&self) -> BTreeSet<u64> {
        self.read_json(KEY_CHECKINS).unwrap_or_default()
    }

    pub fn mark_local_checkin(&self, session_id: u64) -> io::Result<()> {
        let mut checkins = self.local_checkins();
        checkins.insert(session_id);
        self.write_json(KEY_CHECKINS, &checkins)
    }

    pub fn load_preview(&self) -> PreviewIdentity {
        let enabled = self.read(KEY_PREVIEW_ENABLED).as_deref() == Some("1");
        let role = self.read(KEY_PREVIEW_ROLE).and_then(|r| r.parse::<Role>().ok());
        PreviewIdentity { enabled, role }
    }

    pub fn save_preview(&self, role: Role) -> io::Result<()> {
        self.backend
            .set_many(&[(KEY_PREVIEW_ENABLED, "1"), (KEY_PREVIEW_ROLE, role.as_str())])
    }

    pub fn clear_preview(&self) -> io::Result<()> {
        self.backend.remove_many(&[KEY_PREVIEW_ENABLED, KEY_PREVIEW_ROLE])
    }
}
