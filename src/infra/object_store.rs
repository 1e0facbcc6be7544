//! In-process object store used for local runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::storage::{ObjectStore, ObjectStoreError, PutOptions};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    failure: Option<ObjectStoreError>,
}

#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    state: Mutex<State>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Make every subsequent operation fail with `error`.
    pub fn fail_with(&self, error: ObjectStoreError) {
        self.lock().failure = Some(error);
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(state: &State) -> Result<(), ObjectStoreError> {
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> Result<(), ObjectStoreError> {
        let mut state = self.lock();
        Self::check(&state)?;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: options.content_type,
                metadata: options.metadata,
            },
        );
        Ok(())
    }

    fn signed_url(&self, key: &str, expires: Duration) -> Result<String, ObjectStoreError> {
        let state = self.lock();
        Self::check(&state)?;
        let deadline = time::OffsetDateTime::now_utc().unix_timestamp() + expires.as_secs() as i64;
        Ok(format!("{}/{key}?Expires={deadline}", self.base_url))
    }

    async fn head(&self, key: &str) -> Result<(), ObjectStoreError> {
        let state = self.lock();
        Self::check(&state)?;
        if state.objects.contains_key(key) {
            Ok(())
        } else {
            Err(ObjectStoreError::NotFound {
                key: key.to_string(),
            })
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let mut state = self.lock();
        Self::check(&state)?;
        match state.objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(ObjectStoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}
