use serde::{Deserialize, Serialize};

/// Caller context extracted from request headers.
///
/// Every metadata operation is scoped to a tenant; the instance lookup and
/// the metadata collection both require it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: String) -> Self {
        Self {
            tenant_id,
            user_id: None,
        }
    }

    pub fn with_user(tenant_id: String, user_id: Option<String>) -> Self {
        Self { tenant_id, user_id }
    }

    /// Default context for development/testing when no headers are present.
    pub fn default_tenant() -> Self {
        Self {
            tenant_id: "dev-tenant".to_string(),
            user_id: Some("dev-user".to_string()),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::default_tenant()
    }
}
