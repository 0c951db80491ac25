//! Object URLs for avatar images.
//!
//! The query cache keeps the raw bytes. Every consumer gets its own
//! [`AvatarImage`] whose URL stays resolvable until the last clone of that
//! handle is dropped.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const URL_PREFIX: &str = "blob:dynasty/";

#[derive(Default)]
struct Registry {
    next_id: u64,
    live: HashMap<String, Bytes>,
}

#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self, bytes: Bytes) -> AvatarImage {
        let url = {
            let mut registry = self.lock();
            registry.next_id += 1;
            let url = format!("{URL_PREFIX}{}", registry.next_id);
            registry.live.insert(url.clone(), bytes.clone());
            url
        };
        debug!(%url, size = bytes.len(), "Created object URL");
        AvatarImage {
            inner: Arc::new(ObjectUrl {
                url,
                bytes,
                registry: self.clone(),
            }),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.lock().live.get(url).cloned()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.lock().live.contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn revoke(&self, url: &str) {
        if self.lock().live.remove(url).is_some() {
            debug!(%url, "Revoked object URL");
        }
    }
}

struct ObjectUrl {
    url: String,
    bytes: Bytes,
    registry: ObjectUrlRegistry,
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

/// A displayable avatar owned by one consumer.
#[derive(Clone)]
pub struct AvatarImage {
    inner: Arc<ObjectUrl>,
}

impl AvatarImage {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.inner.bytes
    }

    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }
}

impl fmt::Debug for AvatarImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarImage")
            .field("url", &self.inner.url)
            .field("len", &self.inner.bytes.len())
            .finish()
    }
}

impl PartialEq for AvatarImage {
    fn eq(&self, other: &Self) -> bool {
        self.inner.url == other.inner.url
    }
}
