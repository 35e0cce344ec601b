use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Coarse "who changed what" record, independent of the movement ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn stock_item(
        user_id: &str,
        action: &str,
        entity_id: Uuid,
        old_values: Option<Value>,
        new_values: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            action: action.to_string(),
            entity_type: "StockItem".to_string(),
            entity_id,
            old_values,
            new_values,
            created_at: now,
        }
    }
}

/// One external API call, recorded whatever its outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestLog {
    pub id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
