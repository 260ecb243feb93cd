//! In-memory object storage backend.

use crate::{RemoteError, StorageBackend};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, RwLock};

/// An object as stored by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// One call made against a [`MemoryBackend`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Get(String),
    Put { key: String, content_type: String },
}

#[derive(Debug, Default)]
struct Faults {
    get: Option<String>,
    put_prefix: Option<(String, String)>,
}

/// In-memory object store backed by a `RwLock<BTreeMap>`.
///
/// Records every call and can be told to fail gets or puts, which makes it
/// the backend of choice for exercising publish ordering in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    calls: Mutex<Vec<BackendCall>>,
    faults: Mutex<Faults>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a call.
    pub fn insert(&self, key: &str, data: &[u8], content_type: &str) {
        self.objects.write().expect("lock poisoned").insert(
            key.to_owned(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_owned(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().expect("lock poisoned").get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls_guard().clone()
    }

    /// Keys passed to `put_object`, in call order.
    pub fn put_keys(&self) -> Vec<String> {
        self.calls_guard()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Put { key, .. } => Some(key.clone()),
                BackendCall::Get(_) => None,
            })
            .collect()
    }

    /// Make every subsequent `get_object` fail with an HTTP error.
    pub fn fail_gets(&self, message: &str) {
        self.faults_guard().get = Some(message.to_owned());
    }

    /// Make `put_object` fail for keys starting with `prefix`.
    pub fn fail_puts_with_prefix(&self, prefix: &str, message: &str) {
        self.faults_guard().put_prefix = Some((prefix.to_owned(), message.to_owned()));
    }

    fn calls_guard(&self) -> MutexGuard<'_, Vec<BackendCall>> {
        self.calls.lock().expect("lock poisoned")
    }

    fn faults_guard(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().expect("lock poisoned")
    }
}

impl StorageBackend for MemoryBackend {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        self.calls_guard().push(BackendCall::Get(key.to_owned()));
        if let Some(msg) = &self.faults_guard().get {
            return Err(RemoteError::Http(msg.clone()));
        }
        self.object(key)
            .map(|o| o.data)
            .ok_or_else(|| RemoteError::NotFound(key.to_owned()))
    }

    fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), RemoteError> {
        self.calls_guard().push(BackendCall::Put {
            key: key.to_owned(),
            content_type: content_type.to_owned(),
        });
        if let Some((prefix, msg)) = &self.faults_guard().put_prefix {
            if key.starts_with(prefix.as_str()) {
                return Err(RemoteError::Http(msg.clone()));
            }
        }
        tracing::debug!("storing {key} in memory ({} bytes)", data.len());
        self.insert(key, data, content_type);
        Ok(())
    }
}
