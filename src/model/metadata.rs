use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MetadataError;
use crate::model::{generate_id, Id, RequestContext};
use crate::store::traits::MetadataStore;

/// One persisted row of the `instance_metadata` table.
///
/// The value column holds JSON-encoded text; decoding happens lazily in
/// `MetadataEntry`. Rows are soft-deleted: `deleted = true` excludes them
/// from non-deleted queries without physically removing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub id: Id,
    pub instance_id: Id,
    pub key: String,
    pub value: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MetadataRow {
    pub fn new(instance_id: &str, key: &str, value: &Value) -> Result<Self, MetadataError> {
        let now = Utc::now();
        Ok(Self {
            id: generate_id(),
            instance_id: instance_id.to_string(),
            key: key.to_string(),
            value: serde_json::to_string(value)?,
            created: now,
            updated: now,
            deleted: false,
            deleted_at: None,
        })
    }
}

/// In-memory view over one metadata row.
///
/// Owns no state beyond its row; the value is JSON-decoded on every read
/// and JSON-encoded on every write.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    row: MetadataRow,
}

impl MetadataEntry {
    pub(crate) fn new(row: MetadataRow) -> Self {
        Self { row }
    }

    pub fn key(&self) -> &str {
        &self.row.key
    }

    pub fn id(&self) -> &str {
        &self.row.id
    }

    /// Decode the stored text as JSON. Fails with `MalformedData` if the
    /// column holds invalid JSON, which should never happen when all
    /// writers go through `set_value`.
    pub fn value(&self) -> Result<Value, MetadataError> {
        Ok(serde_json::from_str(&self.row.value)?)
    }

    /// Encode `value` as JSON text and persist the row synchronously.
    /// The row's `updated` timestamp is refreshed by the store.
    pub async fn set_value<S: MetadataStore + ?Sized>(
        &mut self,
        store: &S,
        value: &Value,
    ) -> Result<(), MetadataError> {
        self.row.value = serde_json::to_string(value)?;
        self.row = store.save_metadata(&self.row).await?;
        Ok(())
    }

    /// Mark the row soft-deleted and persist.
    pub async fn delete<S: MetadataStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<(), MetadataError> {
        store.delete_metadata(&self.row).await?;
        self.row.deleted = true;
        self.row.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// Singleton `{key: value}` mapping, used by the single-entry view.
    pub fn to_map(&self) -> Result<Map<String, Value>, MetadataError> {
        let mut map = Map::new();
        map.insert(self.row.key.clone(), self.value()?);
        Ok(map)
    }
}

/// All non-deleted metadata entries for one instance, loaded as a unit.
///
/// Presents a mapping interface over the entry set while keeping the row
/// store as the source of truth: structural mutations (new key, delete,
/// clear) trigger a full reload, in-place value updates do not. The snapshot
/// is request-scoped and never shared between collections.
#[derive(Debug)]
pub struct InstanceMetadata<'a, S: MetadataStore + ?Sized> {
    store: &'a S,
    context: RequestContext,
    instance_id: Id,
    entries: Vec<MetadataEntry>,
}

impl<'a, S: MetadataStore + ?Sized> InstanceMetadata<'a, S> {
    /// Open the metadata collection for `(tenant, instance_id)`.
    ///
    /// Requires a non-empty tenant and instance id; this is a precondition
    /// check, not an existence check against the database.
    pub async fn load(
        store: &'a S,
        context: &RequestContext,
        instance_id: &str,
    ) -> Result<InstanceMetadata<'a, S>, MetadataError> {
        if context.tenant_id.is_empty() || instance_id.is_empty() {
            return Err(MetadataError::IncompleteLookup);
        }

        let mut metadata = Self {
            store,
            context: context.clone(),
            instance_id: instance_id.to_string(),
            entries: Vec::new(),
        };
        metadata.reload().await?;
        Ok(metadata)
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Replace the in-memory list with all non-deleted rows for the
    /// instance. Called at load and after every structural change.
    async fn reload(&mut self) -> Result<(), MetadataError> {
        let rows = self.store.find_all_metadata(&self.instance_id).await?;
        self.entries = rows.into_iter().map(MetadataEntry::new).collect();
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, MetadataError> {
        for entry in &self.entries {
            if entry.key() == key {
                return entry.value().map(Some);
            }
        }
        Ok(None)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Result<Value, MetadataError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key() == key)
    }

    /// Insert or replace the value for `key`.
    ///
    /// Existing keys are updated in place without a reload; a new key
    /// creates a row and reloads the collection. Values are stored in
    /// marshaled form, so replacement is whole-value: callers wanting to
    /// touch a nested field must read-modify-write the entire value.
    pub async fn set(&mut self, key: &str, value: &Value) -> Result<(), MetadataError> {
        let store = self.store;
        let mut updated = false;
        for entry in self.entries.iter_mut() {
            if entry.key() == key {
                entry.set_value(store, value).await?;
                updated = true;
            }
        }

        if !updated {
            let row = MetadataRow::new(&self.instance_id, key, value)?;
            store.create_metadata(row).await?;
            self.reload().await?;
        }

        Ok(())
    }

    /// Soft-delete every entry matching `key`, then reload.
    pub async fn remove(&mut self, key: &str) -> Result<(), MetadataError> {
        let store = self.store;
        for entry in self.entries.iter_mut() {
            if entry.key() == key {
                entry.delete(store).await?;
            }
        }

        self.reload().await
    }

    /// Keys in entry order from the last reload (not sorted).
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.key().to_string())
            .collect()
    }

    pub fn values(&self) -> Result<Vec<Value>, MetadataError> {
        self.entries.iter().map(|entry| entry.value()).collect()
    }

    pub fn items(&self) -> Result<Vec<(String, Value)>, MetadataError> {
        self.entries
            .iter()
            .map(|entry| Ok((entry.key().to_string(), entry.value()?)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the value for `key`, failing with `KeyNotFound` if absent.
    ///
    /// Note: despite the name this does not remove the entry; historical
    /// callers depend on the peek behavior, so it is kept as-is.
    pub fn pop(&self, key: &str) -> Result<Value, MetadataError> {
        for entry in &self.entries {
            if entry.key() == key {
                return entry.value();
            }
        }

        Err(MetadataError::KeyNotFound(key.to_string()))
    }

    /// Soft-delete every entry, leaving an empty collection.
    pub async fn clear(&mut self) -> Result<(), MetadataError> {
        let store = self.store;
        for entry in self.entries.iter_mut() {
            entry.delete(store).await?;
        }

        self.reload().await
    }

    /// Snapshot of the current key -> value pairs as a plain mapping.
    pub fn to_map(&self) -> Result<Map<String, Value>, MetadataError> {
        let mut result = Map::new();
        for entry in &self.entries {
            result.insert(entry.key().to_string(), entry.value()?);
        }

        Ok(result)
    }

    /// Structural equality against a plain mapping, via `to_map`.
    pub fn matches(&self, other: &Map<String, Value>) -> Result<bool, MetadataError> {
        Ok(self.to_map()? == *other)
    }

    /// The entry backing `key`, if any. Used by the view layer to render a
    /// single key without re-querying.
    pub fn entry_for_key(&self, key: &str) -> Option<&MetadataEntry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceInfo;
    use crate::store::memory::MemoryStore;
    use crate::store::traits::InstanceStore;
    use serde_json::json;

    fn contract_value() -> Value {
        json!({
            "replicates_from": ["07085bb9-59a3-40a3-9f10-dc24da644c37"],
            "replicates_to": ["a94557b7-aef5-4c33-bcd6-adce1428351c"],
            "writeable": true
        })
    }

    async fn seeded_store() -> (MemoryStore, RequestContext, Id) {
        let store = MemoryStore::new();
        let ctx = RequestContext::new("tenant-a".to_string());
        let instance = InstanceInfo::new("tenant-a", "db-1");
        let instance_id = instance.id.clone();
        store.upsert_instance(instance).await.unwrap();

        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        metadata
            .set("replication_contract", &contract_value())
            .await
            .unwrap();

        (store, ctx, instance_id)
    }

    #[tokio::test]
    async fn test_load_requires_context_and_instance_id() {
        let store = MemoryStore::new();
        let empty_ctx = RequestContext::new(String::new());
        let ctx = RequestContext::new("tenant-a".to_string());

        let err = InstanceMetadata::load(&store, &empty_ctx, "some-instance")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::IncompleteLookup));

        let err = InstanceMetadata::load(&store, &ctx, "").await.unwrap_err();
        assert!(matches!(err, MetadataError::IncompleteLookup));
    }

    #[tokio::test]
    async fn test_get() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        assert_eq!(
            metadata.get("replication_contract").unwrap(),
            Some(contract_value())
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        assert_eq!(metadata.get("this_key_doesnt_exist").unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_or_default() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let default = json!("this_is_the_default_value");
        assert_eq!(
            metadata
                .get_or("this_key_doesnt_exist", default.clone())
                .unwrap(),
            default
        );
    }

    #[tokio::test]
    async fn test_contains() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        assert!(metadata.contains("replication_contract"));
        assert!(!metadata.contains("this_key_doesnt_exist"));
    }

    #[tokio::test]
    async fn test_keys_values_items_len() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        assert_eq!(metadata.keys(), vec!["replication_contract".to_string()]);
        assert_eq!(metadata.values().unwrap(), vec![contract_value()]);
        assert_eq!(
            metadata.items().unwrap(),
            vec![("replication_contract".to_string(), contract_value())]
        );
        assert_eq!(metadata.len(), 1);
        assert!(!metadata.is_empty());
    }

    #[tokio::test]
    async fn test_set_new_key_creates_entry() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        metadata
            .set("myNewKey", &json!("myTestValue"))
            .await
            .unwrap();

        assert!(metadata.contains("myNewKey"));
        let entry = metadata.entry_for_key("myNewKey").unwrap();
        assert_eq!(entry.to_map().unwrap(), {
            let mut expected = Map::new();
            expected.insert("myNewKey".to_string(), json!("myTestValue"));
            expected
        });
    }

    #[tokio::test]
    async fn test_set_existing_key_replaces_value() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let replacement = json!({"one": [9]});
        metadata
            .set("replication_contract", &replacement)
            .await
            .unwrap();

        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata.get("replication_contract").unwrap(),
            Some(replacement.clone())
        );

        // Replacement must be visible to a fresh collection too.
        let fresh = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        assert_eq!(fresh.get("replication_contract").unwrap(), Some(replacement));
    }

    #[tokio::test]
    async fn test_json_round_trip_of_nested_values() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let value = json!({
            "nested": {"list": [1, 2.5, "three", null], "flag": false},
            "count": 42
        });
        metadata.set("roundTrip", &value).await.unwrap();

        let fresh = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        assert_eq!(fresh.get("roundTrip").unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        metadata.remove("replication_contract").await.unwrap();

        assert!(!metadata.contains("replication_contract"));
        assert!(!metadata
            .keys()
            .contains(&"replication_contract".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        metadata.set("second", &json!(2)).await.unwrap();

        metadata.clear().await.unwrap();

        assert_eq!(metadata.len(), 0);
        assert!(metadata.is_empty());
    }

    #[tokio::test]
    async fn test_set_after_clear_recreates_key() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        metadata.clear().await.unwrap();
        metadata
            .set("replication_contract", &json!("fresh"))
            .await
            .unwrap();

        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata.get("replication_contract").unwrap(),
            Some(json!("fresh"))
        );
    }

    #[tokio::test]
    async fn test_pop_returns_value_without_removing() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let value = metadata.pop("replication_contract").unwrap();
        assert_eq!(value, contract_value());
        // pop is a peek; the entry stays.
        assert!(metadata.contains("replication_contract"));
    }

    #[tokio::test]
    async fn test_pop_missing_key() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let err = metadata.pop("this_key_doesnt_exist").unwrap_err();
        assert!(matches!(err, MetadataError::KeyNotFound(key) if key == "this_key_doesnt_exist"));
    }

    #[tokio::test]
    async fn test_to_map_matches_items() {
        let (store, ctx, instance_id) = seeded_store().await;
        let mut metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        metadata.set("second", &json!([2, 3, 5])).await.unwrap();

        let map = metadata.to_map().unwrap();
        let items = metadata.items().unwrap();
        assert_eq!(map.len(), items.len());
        for (key, value) in items {
            assert_eq!(map.get(&key), Some(&value));
        }
    }

    #[tokio::test]
    async fn test_matches() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let mut expected = Map::new();
        expected.insert("replication_contract".to_string(), contract_value());
        assert!(metadata.matches(&expected).unwrap());

        expected.insert("extra".to_string(), json!(1));
        assert!(!metadata.matches(&expected).unwrap());
    }

    #[tokio::test]
    async fn test_entry_for_key() {
        let (store, ctx, instance_id) = seeded_store().await;
        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();

        let entry = metadata.entry_for_key("replication_contract").unwrap();
        assert_eq!(entry.key(), "replication_contract");
        assert!(!entry.id().is_empty());

        assert!(metadata.entry_for_key("this_key_doesnt_exist").is_none());
    }

    #[tokio::test]
    async fn test_collections_are_isolated_by_instance() {
        let (store, ctx, instance_id) = seeded_store().await;

        let other = InstanceInfo::new("tenant-a", "db-2");
        let other_id = other.id.clone();
        store.upsert_instance(other).await.unwrap();

        let mut other_meta = InstanceMetadata::load(&store, &ctx, &other_id)
            .await
            .unwrap();
        // Same key, different instance: neither side sees the other's value.
        other_meta
            .set("replication_contract", &json!("other"))
            .await
            .unwrap();

        let first = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        assert_eq!(
            first.get("replication_contract").unwrap(),
            Some(contract_value())
        );
        assert_eq!(
            other_meta.get("replication_contract").unwrap(),
            Some(json!("other"))
        );
    }

    #[tokio::test]
    async fn test_malformed_stored_value_surfaces() {
        let (store, ctx, instance_id) = seeded_store().await;

        let mut row = MetadataRow::new(&instance_id, "corrupt", &json!(null)).unwrap();
        row.value = "{not json".to_string();
        store.create_metadata(row).await.unwrap();

        let metadata = InstanceMetadata::load(&store, &ctx, &instance_id)
            .await
            .unwrap();
        let err = metadata.get("corrupt").unwrap_err();
        assert!(matches!(err, MetadataError::MalformedData(_)));
    }
}
