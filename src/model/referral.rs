use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked click-through. Converts at most once; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub converted: bool,
    pub sale_id: Option<Uuid>,
}
