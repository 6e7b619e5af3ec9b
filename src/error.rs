use thiserror::Error;

/// Errors raised by the metadata model.
///
/// HTTP-level not-found/bad-request decisions are made at the handler
/// boundary before any mutation; these variants cover the model itself.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Raised at collection load when the tenant or instance id is missing.
    /// A precondition check, not an existence check against the database.
    #[error("Not enough given to find metadata.")]
    IncompleteLookup,

    /// Model-level lookup failure, only reachable through direct model use.
    #[error("Metadata key: {0} not found.")]
    KeyNotFound(String),

    /// A stored value failed to decode as JSON. All writers encode through
    /// the model, so this indicates data corruption and surfaces as an
    /// internal error rather than being swallowed.
    #[error("Stored metadata value is not valid JSON: {0}")]
    MalformedData(#[from] serde_json::Error),

    /// Row store failure, propagated as-is. No compensating rollback is
    /// attempted here.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
