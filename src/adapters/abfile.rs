//! File-backed trust-mark store
//!
//! One file per entry: the filename is the base64url encoding of the key,
//! the body is JSON. Filenames ending in `.lock` are reserved for locking
//! and never treated as entries. The content classifier used by the store
//! inspector lives here as well.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::ports::store::{KeyValueStore, ModifyFn, StoreError};

/// Key-value store with one JSON file per entry
pub struct AbFileStore {
    base_dir: PathBuf,
    // Key-level serialization for read-modify-write
    write_lock: Mutex<()>,
}

impl AbFileStore {
    /// Open (and create if needed) a store rooted at `base_dir`
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Encode a store key into its filename form
    pub fn encode_key(key: &str) -> String {
        URL_SAFE_NO_PAD.encode(key.as_bytes())
    }

    /// Decode a filename back into the store key
    pub fn decode_key(name: &str) -> Result<String, StoreError> {
        let raw = URL_SAFE_NO_PAD
            .decode(name)
            .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        String::from_utf8(raw).map_err(|e| StoreError::InvalidKey(e.to_string()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(Self::encode_key(key))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entry(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key);
        fs::write(&path, serde_json::to_vec(value)?).await?;
        Ok(())
    }

    async fn remove_entry(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for AbFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.read_entry(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.write_entry(key, &value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.remove_entry(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        let mut dir = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".lock") {
                continue;
            }
            match Self::decode_key(name) {
                Ok(key) => out.push(key),
                Err(_) => debug!(name, "skipping file with undecodable name"),
            }
        }
        out.sort();
        Ok(out)
    }

    async fn modify(&self, key: &str, f: ModifyFn) -> Result<Option<Value>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_entry(key).await?;
        match f(current)? {
            Some(value) => {
                self.write_entry(key, &value).await?;
                Ok(Some(value))
            }
            None => {
                self.remove_entry(key).await?;
                Ok(None)
            }
        }
    }
}

/// What a store entry body turned out to contain
#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    /// A JSON document
    Json(Value),
    /// A compact JWS: three base64url segments, header carries `alg`
    Jws {
        /// Decoded protected header
        header: Value,
        /// Decoded payload, `None` for detached or non-JSON payloads
        payload: Option<Value>,
    },
    /// A compact JWE: five base64url segments, header carries `enc`
    Jwe {
        /// Decoded protected header
        protected: Value,
    },
    /// Neither JSON nor compact JOSE
    Other,
}

fn is_b64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn decode_json_segment(segment: &str) -> Option<Value> {
    let raw = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn classify_compact(compact: &str) -> Option<ContentKind> {
    let parts: Vec<&str> = compact.trim().split('.').collect();
    if parts.len() != 3 && parts.len() != 5 {
        return None;
    }
    // Payload may be empty for detached JWS
    if !parts.iter().all(|p| is_b64url(p)) {
        return None;
    }
    let header = decode_json_segment(parts[0])?;

    if parts.len() == 3 {
        if header.get("alg").is_none() {
            return None;
        }
        let payload = if parts[1].is_empty() {
            None
        } else {
            decode_json_segment(parts[1])
        };
        Some(ContentKind::Jws { header, payload })
    } else {
        if header.get("enc").is_none() {
            return None;
        }
        Some(ContentKind::Jwe { protected: header })
    }
}

/// Classify a store entry body as JSON, compact JWS, compact JWE or other
///
/// JSON is attempted first; a JSON string holding a compact JOSE value is
/// classified as that token.
pub fn classify_content(text: &str) -> ContentKind {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Value::String(inner) = &value {
            if let Some(kind) = classify_compact(inner) {
                return kind;
            }
        }
        return ContentKind::Json(value);
    }
    classify_compact(trimmed).unwrap_or(ContentKind::Other)
}
