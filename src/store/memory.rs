use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;

use crate::model::{Id, InstanceInfo, MetadataRow};
use crate::store::traits::{InstanceStore, MetadataStore, Store};

/// In-memory store used by unit/integration tests and local development.
///
/// Rows live in insertion order so `find_all_metadata` reproduces the load
/// order the model exposes through `keys()` and friends. Soft-deleted rows
/// are kept, matching the persistent layout.
#[derive(Debug, Default)]
pub struct MemoryStore {
    instances: RwLock<Vec<InstanceInfo>>,
    metadata: RwLock<Vec<MetadataRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InstanceStore for MemoryStore {
    async fn get_instance(&self, tenant_id: &str, id: &Id) -> Result<Option<InstanceInfo>> {
        let instances = self.instances.read();
        Ok(instances
            .iter()
            .find(|instance| instance.id == *id && instance.tenant_id == tenant_id)
            .cloned())
    }

    async fn upsert_instance(&self, instance: InstanceInfo) -> Result<()> {
        let mut instances = self.instances.write();
        if let Some(existing) = instances.iter_mut().find(|i| i.id == instance.id) {
            *existing = instance;
        } else {
            instances.push(instance);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryStore {
    async fn find_all_metadata(&self, instance_id: &Id) -> Result<Vec<MetadataRow>> {
        let metadata = self.metadata.read();
        Ok(metadata
            .iter()
            .filter(|row| row.instance_id == *instance_id && !row.deleted)
            .cloned()
            .collect())
    }

    async fn create_metadata(&self, row: MetadataRow) -> Result<MetadataRow> {
        let mut metadata = self.metadata.write();
        metadata.push(row.clone());
        Ok(row)
    }

    async fn save_metadata(&self, row: &MetadataRow) -> Result<MetadataRow> {
        let mut metadata = self.metadata.write();
        let stored = metadata
            .iter_mut()
            .find(|candidate| candidate.id == row.id)
            .ok_or_else(|| anyhow::anyhow!("Metadata row not found: {}", row.id))?;

        stored.value = row.value.clone();
        stored.updated = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_metadata(&self, row: &MetadataRow) -> Result<()> {
        let mut metadata = self.metadata.write();
        let stored = metadata
            .iter_mut()
            .find(|candidate| candidate.id == row.id)
            .ok_or_else(|| anyhow::anyhow!("Metadata row not found: {}", row.id))?;

        stored.deleted = true;
        stored.deleted_at = Some(Utc::now());
        Ok(())
    }
}

impl Store for MemoryStore {}
