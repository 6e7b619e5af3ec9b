use crate::model::{Id, InstanceInfo, MetadataRow};
use anyhow::Result;

/// Tenant-scoped instance resolution.
///
/// Instance provisioning lives elsewhere in the control plane; this service
/// only needs to check that an instance exists for the caller's tenant.
/// `upsert_instance` exists for seeding and tests.
#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get_instance(&self, tenant_id: &str, id: &Id) -> Result<Option<InstanceInfo>>;
    async fn upsert_instance(&self, instance: InstanceInfo) -> Result<()>;
}

/// Row access for the `instance_metadata` table.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// All non-deleted rows for an instance, in load order.
    async fn find_all_metadata(&self, instance_id: &Id) -> Result<Vec<MetadataRow>>;
    /// Persist a freshly built row.
    async fn create_metadata(&self, row: MetadataRow) -> Result<MetadataRow>;
    /// Persist value changes to an existing row, refreshing `updated`.
    async fn save_metadata(&self, row: &MetadataRow) -> Result<MetadataRow>;
    /// Soft-delete a row, setting `deleted` and `deleted_at`.
    async fn delete_metadata(&self, row: &MetadataRow) -> Result<()>;
}

pub trait Store: InstanceStore + MetadataStore + Send + Sync {}
