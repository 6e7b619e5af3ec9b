use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::MetadataError;
use crate::model::{InstanceMetadata, MetadataEntry};
use crate::store::traits::MetadataStore;

/// Wire shape for both metadata views: `{"metadata": {key: value, ...}}`
/// for a full collection, a singleton mapping for a single entry.
#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub metadata: Map<String, Value>,
}

impl MetadataResponse {
    pub fn of_collection<S: MetadataStore + ?Sized>(
        metadata: &InstanceMetadata<'_, S>,
    ) -> Result<Self, MetadataError> {
        Ok(Self {
            metadata: metadata.to_map()?,
        })
    }

    pub fn of_entry(entry: &MetadataEntry) -> Result<Self, MetadataError> {
        Ok(Self {
            metadata: entry.to_map()?,
        })
    }
}
