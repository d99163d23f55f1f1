pub mod audit;
pub mod store;
pub mod tracker;

use serde::{Deserialize, Serialize};

pub use self::audit::spawn_audit_logger;
pub use self::store::{SqliteUsageStore, UsageStore};
pub use self::tracker::{QuotaDecision, QuotaTracker};

/// A single usage event to be recorded asynchronously by the audit logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub identity: String,
    pub request_id: String,
    pub kind: String,
    pub source: String,
    pub latency_ms: u64,
    pub status: String,
}
