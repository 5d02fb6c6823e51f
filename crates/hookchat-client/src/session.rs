use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key under which a persistent store keeps the session id.
pub const SESSION_STORAGE_KEY: &str = "hookchat.session_id";

pub fn new_session_id() -> String {
    format!("sess-{}", uuid::Uuid::new_v4())
}

/// Source of the conversation id sent with every message. Implementations
/// never fail; storage problems degrade to an in-memory id.
pub trait SessionStore: Send + Sync {
    fn get_or_create(&self) -> String;

    fn clear(&self);

    fn reset(&self) -> String {
        self.clear();
        self.get_or_create()
    }
}

impl<T> SessionStore for std::sync::Arc<T>
where
    T: SessionStore + ?Sized,
{
    fn get_or_create(&self) -> String {
        (**self).get_or_create()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn reset(&self) -> String {
        (**self).reset()
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(Some(id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get_or_create(&self) -> String {
        lock(&self.current)
            .get_or_insert_with(new_session_id)
            .clone()
    }

    fn clear(&self) {
        *lock(&self.current) = None;
    }
}

/// Keeps the id in a small JSON key-value file so it survives restarts.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "session file unreadable"
                );
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "session file is not a JSON object, ignoring it"
                );
                Map::new()
            }
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::warn!(
                    path = %parent.display(),
                    error = %err,
                    "create session directory failed"
                );
                return;
            }
        }
        let encoded = match serde_json::to_string_pretty(entries) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(error = %err, "encode session file failed");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, encoded) {
            tracing::warn!(path = %self.path.display(), error = %err, "write session file failed");
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get_or_create(&self) -> String {
        let mut cached = lock(&self.cached);
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let mut entries = self.read_entries();
        let stored = entries
            .get(SESSION_STORAGE_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        let id = match stored {
            Some(id) => id,
            None => {
                let id = new_session_id();
                entries.insert(SESSION_STORAGE_KEY.to_string(), Value::String(id.clone()));
                self.write_entries(&entries);
                id
            }
        };
        *cached = Some(id.clone());
        id
    }

    fn clear(&self) {
        let mut cached = lock(&self.cached);
        *cached = None;
        let mut entries = self.read_entries();
        if entries.remove(SESSION_STORAGE_KEY).is_some() {
            self.write_entries(&entries);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
