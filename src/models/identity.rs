use serde::{Deserialize, Serialize};

/// Authenticated log source as reported by the auth service.
///
/// Never persisted on its own; ingestion copies `id` and `user_id` into each
/// entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIdentity {
    pub id: String,

    /// Display name, also the default `source` of submitted entries
    pub name: String,

    pub user_id: String,
}
