use super::MetadataStore;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory JSON tree keyed by slash-separated paths. Also used for dry runs.
#[derive(Clone)]
pub struct MockMetadataStore {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
    failing_writes: Arc<Mutex<HashSet<usize>>>,
    fail_deletes: Arc<Mutex<bool>>,
    write_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn is_within(key: &str, path: &str) -> bool {
    path.is_empty() || key == path || key.starts_with(&format!("{}/", path))
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            failing_writes: Arc::new(Mutex::new(HashSet::new())),
            fail_deletes: Arc::new(Mutex::new(false)),
            write_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_entry(self, path: &str, value: Value) -> Self {
        self.entries.lock().unwrap().insert(normalize(path), value);
        self
    }

    /// Fail the `call`-th write (1-based) issued against this store.
    pub fn with_write_failure_on_call(self, call: usize) -> Self {
        self.failing_writes.lock().unwrap().insert(call);
        self
    }

    pub fn with_delete_failure(self, fail: bool) -> Self {
        *self.fail_deletes.lock().unwrap() = fail;
        self
    }

    pub fn get_write_count(&self) -> usize {
        *self.write_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    /// Every stored leaf path under `path`.
    pub fn paths_under(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        self.entries
            .lock()
            .unwrap()
            .keys()
            .filter(|key| is_within(key, &path))
            .cloned()
            .collect()
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_nested(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            root.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_nested(map, rest, value);
            }
        }
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn write(&self, path: &str, value: &Value) -> Result<()> {
        let call = {
            let mut count = self.write_count.lock().unwrap();
            *count += 1;
            *count
        };

        if self.failing_writes.lock().unwrap().contains(&call) {
            return Err(Error::MetadataStore(format!(
                "Mock write failure for {}",
                path
            )));
        }

        let path = normalize(path);
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|key, _| !is_within(key, &path));
        entries.insert(path, value.clone());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let path = normalize(path);
        let entries = self.entries.lock().unwrap();

        if let Some(value) = entries.get(&path) {
            return Ok(Some(value.clone()));
        }

        let mut tree = Map::new();
        for (key, value) in entries.iter().filter(|(key, _)| is_within(key, &path)) {
            let relative = if path.is_empty() {
                key.as_str()
            } else {
                &key[path.len() + 1..]
            };
            let segments: Vec<&str> = relative.split('/').collect();
            insert_nested(&mut tree, &segments, value.clone());
        }

        if tree.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(tree)))
        }
    }

    async fn delete_subtree(&self, path: &str) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;

        if *self.fail_deletes.lock().unwrap() {
            return Err(Error::MetadataStore(format!(
                "Mock delete failure for {}",
                path
            )));
        }

        let path = normalize(path);
        if path.is_empty() {
            return Err(Error::Invariant(
                "Refusing to delete the metadata store root".to_string(),
            ));
        }

        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !is_within(key, &path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_read_leaf_and_subtree() {
        let store = MockMetadataStore::new();

        store
            .write("daily/2024-01-01/a", &json!({ "url": "u1" }))
            .await
            .unwrap();
        store
            .write("daily/2024-01-01/b", &json!({ "url": "u2" }))
            .await
            .unwrap();

        let leaf = store.read("daily/2024-01-01/a").await.unwrap().unwrap();
        assert_eq!(leaf["url"], "u1");

        let subtree = store.read("daily/2024-01-01").await.unwrap().unwrap();
        assert_eq!(subtree["b"]["url"], "u2");
        assert_eq!(subtree.as_object().unwrap().len(), 2);

        assert!(store.read("daily/2024-01-02").await.unwrap().is_none());
        assert_eq!(store.get_write_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_subtree_leaves_siblings() {
        let store = MockMetadataStore::new()
            .with_entry("daily/2024-01-01/a", json!(1))
            .with_entry("daily/2024-01-010/x", json!(2))
            .with_entry("daily/2024-01-02/b", json!(3));

        store.delete_subtree("daily/2024-01-01").await.unwrap();

        assert_eq!(
            store.paths_under("daily"),
            vec!["daily/2024-01-010/x", "daily/2024-01-02/b"]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_subtree_succeeds() {
        let store = MockMetadataStore::new();
        store.delete_subtree("daily/1999-01-01").await.unwrap();
        assert_eq!(store.get_delete_count(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_on_selected_call() {
        let store = MockMetadataStore::new().with_write_failure_on_call(2);

        assert!(store.write("p/1", &json!(1)).await.is_ok());
        assert!(store.write("p/2", &json!(2)).await.is_err());
        assert!(store.write("p/3", &json!(3)).await.is_ok());
        assert_eq!(store.paths_under("p"), vec!["p/1", "p/3"]);
    }

    #[tokio::test]
    async fn test_delete_failure() {
        let store = MockMetadataStore::new()
            .with_entry("p/1", json!(1))
            .with_delete_failure(true);

        assert!(store.delete_subtree("p").await.is_err());
        assert_eq!(store.paths_under("p").len(), 1);
    }
}
