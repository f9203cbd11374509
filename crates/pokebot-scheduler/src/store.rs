//! Persisted target sets.
//!
//! All namespaces live in one JSON document (`{"likes": ["123"], "sign": [...]}`).
//! Every change rewrites the whole document through a temp file and a
//! rename, so a crash never leaves half a file behind. Calls that change
//! nothing do not touch the disk.
//!
//! After a failed write the in-memory document is authoritative: it is not
//! reloaded from disk, and every later mutation retries the write until one
//! succeeds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use pokebot_core::cq;
use pokebot_core::error::Result;
use regex::Regex;
use tokio::sync::Mutex;

type Document = BTreeMap<String, Vec<String>>;

static AT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@(\d+)$").expect("mention regex"));

/// Whether `id` is a plain numeric identifier.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Accepts a mention segment, `@123` or a bare `123`.
pub fn parse_target(input: &str) -> Option<String> {
    let input = input.trim();
    if let [segment] = cq::parse(input).as_slice()
        && let Some(qq) = segment.param("at", "qq")
    {
        return is_valid_id(qq).then(|| qq.to_string());
    }
    if let Some(caps) = AT_TEXT.captures(input) {
        return Some(caps[1].to_string());
    }
    is_valid_id(input).then(|| input.to_string())
}

struct State {
    doc: Document,
    /// Memory holds changes the file does not.
    dirty: bool,
}

/// Deduplicated identifier sets keyed by namespace, backed by one JSON file.
pub struct TargetStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl TargetStore {
    /// Open the store, loading whatever is already on disk.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = read_document(&path).await.unwrap_or_default();
        tracing::debug!(
            "Target store {} loaded ({} namespaces)",
            path.display(),
            doc.len()
        );
        Self {
            path,
            state: Mutex::new(State { doc, dirty: false }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, ns: &str) -> Vec<String> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await;
        state.doc.get(ns).cloned().unwrap_or_default()
    }

    /// Whether memory holds changes that could not be written yet.
    pub async fn has_unsaved_changes(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Add `id` to `ns`. `false` when the id is invalid or already present.
    pub async fn add(&self, ns: &str, id: &str) -> bool {
        if !is_valid_id(id) {
            tracing::debug!("Rejected target '{id}' for {ns}: not numeric");
            return false;
        }
        self.mutate(ns, |ids| {
            if ids.iter().any(|x| x == id) {
                return false;
            }
            ids.push(id.to_string());
            true
        })
        .await
    }

    /// Remove `id` from `ns`. `false` when it was not there.
    pub async fn remove(&self, ns: &str, id: &str) -> bool {
        if !is_valid_id(id) {
            return false;
        }
        self.mutate(ns, |ids| {
            let before = ids.len();
            ids.retain(|x| x != id);
            ids.len() != before
        })
        .await
    }

    /// Empty `ns`. `false` when it was already empty.
    pub async fn clear(&self, ns: &str) -> bool {
        self.mutate(ns, |ids| {
            if ids.is_empty() {
                return false;
            }
            ids.clear();
            true
        })
        .await
    }

    /// Read-modify-write of one namespace, serialized by the state lock.
    async fn mutate(&self, ns: &str, change: impl FnOnce(&mut Vec<String>) -> bool) -> bool {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await;

        let changed = change(state.doc.entry(ns.to_string()).or_default());
        if changed || state.dirty {
            match write_document(&self.path, &state.doc).await {
                Ok(()) => state.dirty = false,
                Err(e) => {
                    tracing::warn!("Failed to save {}, keeping changes in memory: {e}", self.path.display());
                    state.dirty = true;
                }
            }
        }
        changed
    }

    /// Pick up changes another process made to the file, unless memory is ahead of it.
    async fn refresh(&self, state: &mut State) {
        if state.dirty {
            return;
        }
        if let Some(on_disk) = read_document(&self.path).await {
            state.doc = on_disk;
        }
    }
}

/// `None` when the file is missing or unreadable.
async fn read_document(path: &Path) -> Option<Document> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!("Failed to parse {}: {e}", path.display());
            None
        }
    }
}

async fn write_document(path: &Path, doc: &Document) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::debug!("Saved targets to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pokebot-test-store-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_parse_target_forms() {
        assert_eq!(parse_target("[CQ:at,qq=12345]").as_deref(), Some("12345"));
        assert_eq!(parse_target("@678").as_deref(), Some("678"));
        assert_eq!(parse_target(" 42 ").as_deref(), Some("42"));
        assert_eq!(parse_target("[CQ:at,qq=all]"), None);
        assert_eq!(parse_target("abc"), None);
        assert_eq!(parse_target("12a"), None);
        assert_eq!(parse_target("１２３"), None);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_skips_write() {
        let dir = test_dir("idempotent");
        let path = dir.join("targets.json");
        let store = TargetStore::open(&path).await;

        assert!(store.add("likes", "123").await);
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        assert!(!store.add("likes", "123").await);
        assert!(!path.exists(), "no-op add must not write");
        assert_eq!(store.get("likes").await, vec!["123".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_invalid_id_rejected_without_write() {
        let dir = test_dir("invalid");
        let path = dir.join("targets.json");
        let store = TargetStore::open(&path).await;

        assert!(!store.add("likes", "abc").await);
        assert!(!path.exists());
        assert!(store.get("likes").await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_sizes() {
        for n in [0usize, 1, 25] {
            let dir = test_dir(&format!("roundtrip-{n}"));
            let path = dir.join("targets.json");
            let ids: Vec<String> = (0..n).map(|i| format!("{}", 10_000 + i * 7)).collect();
            {
                let store = TargetStore::open(&path).await;
                for id in &ids {
                    assert!(store.add("sign", id).await);
                }
            }
            let reopened = TargetStore::open(&path).await;
            assert_eq!(reopened.get("sign").await, ids);
            std::fs::remove_dir_all(&dir).ok();
        }
    }

    #[tokio::test]
    async fn test_namespaces_share_one_document() {
        let dir = test_dir("namespaces");
        let path = dir.join("targets.json");
        let store = TargetStore::open(&path).await;

        assert!(store.add("likes", "1").await);
        assert!(store.add("sign", "2").await);
        assert!(store.remove("likes", "1").await);
        assert!(!store.remove("likes", "1").await);
        assert!(store.clear("sign").await);
        assert!(!store.clear("sign").await);

        let raw: Document = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("likes"), Some(&Vec::new()));
        assert_eq!(raw.get("sign"), Some(&Vec::new()));
        assert!(!dir.join("targets.json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_failed_write_keeps_changes_in_memory() {
        let dir = test_dir("write-failure");
        let path = dir.join("targets.json");
        let store = TargetStore::open(&path).await;
        assert!(store.add("likes", "1").await);

        // A directory where the temp file goes makes every write fail.
        let tmp = dir.join("targets.json.tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        assert!(store.add("likes", "2").await);
        assert!(store.has_unsaved_changes().await);
        assert_eq!(store.get("likes").await, vec!["1".to_string(), "2".to_string()]);
        assert!(store.add("sign", "3").await);
        assert_eq!(store.get("likes").await, vec!["1".to_string(), "2".to_string()]);

        // Once writing works again the next mutation persists everything.
        std::fs::remove_dir_all(&tmp).unwrap();
        assert!(!store.add("likes", "2").await);
        assert!(!store.has_unsaved_changes().await);
        let reopened = TargetStore::open(&path).await;
        assert_eq!(reopened.get("likes").await, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(reopened.get("sign").await, vec!["3".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_sees_changes_from_another_store() {
        let dir = test_dir("shared");
        let path = dir.join("targets.json");
        let a = TargetStore::open(&path).await;
        let b = TargetStore::open(&path).await;

        assert!(a.add("likes", "7").await);
        assert!(b.add("sign", "8").await);
        assert_eq!(a.get("sign").await, vec!["8".to_string()]);
        assert_eq!(b.get("likes").await, vec!["7".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
