//! # Persisted Fallback Cache
//!
//! Salinan terakhir response yang sukses, disimpan di disk sebagai satu file
//! JSON per key. Dipakai hanya ketika semua retry gagal dan cache memory
//! kosong (misalnya tepat setelah restart).
//!
//! Format file:
//!
//! ```json
//! { "saved_at_ms": 1700000000000, "payload": { ... } }
//! ```
//!
//! Entry yang lebih tua dari `max_age` atau tidak bisa di-parse diperlakukan
//! sebagai tidak ada. Kegagalan I/O tidak pernah menjadi error read path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use suigives_common::current_timestamp_ms;
use tracing::{debug, warn};

/// Default maximum age of a persisted entry (30 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    saved_at_ms: u64,
    payload: Value,
}

/// Directory-backed store of last-known-good responses.
#[derive(Debug, Clone)]
pub struct PersistedCache {
    dir: PathBuf,
    max_age: Duration,
}

impl PersistedCache {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self { dir: dir.into(), max_age }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Hex of the key bytes, so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }

    /// Write `payload` for `key`, replacing any previous entry.
    pub fn store(&self, key: &str, payload: &Value) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = PersistedEntry { saved_at_ms: current_timestamp_ms(), payload: payload.clone() };
        let bytes = serde_json::to_vec(&entry).map_err(io::Error::other)?;

        // Write then rename so readers never see a torn file.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "persisted cache entry written");
        Ok(())
    }

    /// Same as [`store`](Self::store) but only logs failures.
    pub fn store_quietly(&self, key: &str, payload: &Value) {
        if let Err(e) = self.store(key, payload) {
            warn!(key, error = %e, "failed to write persisted cache entry");
        }
    }

    /// Entry for `key` if it exists, parses, and is younger than `max_age`.
    pub fn load(&self, key: &str) -> Option<Value> {
        self.load_at(key, current_timestamp_ms())
    }

    fn load_at(&self, key: &str, now_ms: u64) -> Option<Value> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read persisted cache entry");
                return None;
            }
        };

        let entry: PersistedEntry = match serde_json::from_slice(&bytes) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "corrupt persisted cache entry ignored");
                return None;
            }
        };

        let age_ms = now_ms.saturating_sub(entry.saved_at_ms);
        if u128::from(age_ms) > self.max_age.as_millis() {
            debug!(key, age_ms, "persisted cache entry too old");
            return None;
        }
        Some(entry.payload)
    }

    /// Remove the entry for `key`. Missing entries are not an error.
    pub fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> PersistedCache {
        PersistedCache::new(dir.path().join("cache"), DEFAULT_MAX_AGE)
    }

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir);
        let payload = json!({"campaigns": [{"id": "0x1"}]});

        c.store("campaigns:all", &payload).unwrap();
        assert_eq!(c.load("campaigns:all"), Some(payload));
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cache(&dir).load("nothing"), None);
    }

    #[test]
    fn test_expired_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir);
        c.store("k", &json!(1)).unwrap();

        let later = current_timestamp_ms() + DEFAULT_MAX_AGE.as_millis() as u64 + 1_000;
        assert_eq!(c.load_at("k", later), None);
    }

    #[test]
    fn test_corrupt_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir);
        fs::create_dir_all(c.dir()).unwrap();
        fs::write(c.path_for("bad"), b"{not json").unwrap();
        assert_eq!(c.load("bad"), None);
    }

    #[test]
    fn test_keys_map_to_distinct_files() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir);
        let path = c.path_for("campaign:0xabc/../x");
        assert_eq!(path.parent(), Some(c.dir()));

        c.store("balance:0x1:SUI", &json!(5)).unwrap();
        c.store("balance:0x1:SGUSD", &json!(6)).unwrap();
        assert_eq!(c.load("balance:0x1:SUI"), Some(json!(5)));
        assert_eq!(c.load("balance:0x1:SGUSD"), Some(json!(6)));

        // Separators that a lossy mapping would fold together.
        assert_ne!(c.path_for("campaign:0x1_a"), c.path_for("campaign_0x1:a"));
        c.store("campaign:0x1_a", &json!(1)).unwrap();
        c.store("campaign_0x1:a", &json!(2)).unwrap();
        assert_eq!(c.load("campaign:0x1_a"), Some(json!(1)));
        assert_eq!(c.load("campaign_0x1:a"), Some(json!(2)));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir);
        c.store("k", &json!("v")).unwrap();
        c.remove("k").unwrap();
        c.remove("k").unwrap();
        assert_eq!(c.load("k"), None);
    }
}
