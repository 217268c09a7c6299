//! SQLite-backed persistence for travel queries and their reports.

mod store;

pub use store::HistoryStore;

use serde::{Deserialize, Serialize};

use crate::advisor::TravelReport;

/// A stored travel query together with the report generated for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRecord {
    pub id: i64,
    pub query: String,
    pub destination: String,
    pub origin: Option<String>,
    pub response: TravelReport,
    /// RFC 3339, UTC. Insert time, not report time.
    pub created_at: String,
}
