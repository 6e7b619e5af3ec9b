pub mod common;
pub mod context;
pub mod instance;
pub mod metadata;

pub use common::{generate_id, Id};
pub use context::RequestContext;
pub use instance::InstanceInfo;
pub use metadata::{InstanceMetadata, MetadataEntry, MetadataRow};
