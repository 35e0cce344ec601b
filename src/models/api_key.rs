use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub key_hash: String,
    pub is_active: bool,
}

impl ApiKey {
    /// Principal tag written to `performed_by` for key-authenticated changes.
    pub fn performer_tag(&self) -> String {
        format!("API_KEY_{}", self.id)
    }
}
