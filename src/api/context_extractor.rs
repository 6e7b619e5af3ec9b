use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::RequestContext;

/// Axum extractor for RequestContext from request headers
///
/// This extractor looks for caller information in request headers:
/// - X-Tenant-Id: tenant the request is scoped to
/// - X-User-Id: optional user identifier for logging
///
/// For development/testing, if no tenant header is present, returns the
/// default tenant context.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        if let Some(tenant_id) = extract_header_value(headers, "x-tenant-id") {
            let user_id = extract_header_value(headers, "x-user-id");
            Ok(RequestContext::with_user(tenant_id, user_id))
        } else {
            // For development: return the default tenant if no header is
            // present. Production deployments front this with an auth proxy.
            Ok(RequestContext::default_tenant())
        }
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}
