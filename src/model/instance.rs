use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provisioned database instance owned by a tenant.
///
/// The instance lifecycle (provisioning, resizing, teardown) is owned by the
/// rest of the control plane; this service only resolves instances to verify
/// that metadata requests target something that exists for the caller's
/// tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: Id,
    pub tenant_id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl InstanceInfo {
    pub fn new(tenant_id: &str, name: &str) -> Self {
        Self {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn new_with_id(id: Id, tenant_id: &str, name: &str) -> Self {
        Self {
            id,
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}
