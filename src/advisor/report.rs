//! Structured travel requirement reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Placeholder for fields a legacy record never stored.
const UNAVAILABLE: &str = "Information not available";

/// AI-generated travel requirement information.
///
/// Serialized with the camelCase wire names the frontend consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelReport {
    pub destination: String,
    pub origin: String,
    pub visa_requirements: String,
    pub documents: Vec<String>,
    pub advisories: Vec<String>,
    pub estimated_processing_time: String,
    pub embassy_information: String,
    /// RFC 3339. Backfilled with the current time when the model omits it.
    #[serde(default)]
    pub timestamp: String,
}

impl TravelReport {
    /// Normalize the timestamp to RFC 3339 UTC.
    ///
    /// Models occasionally emit a literal like "current timestamp" or a
    /// local-time string; anything unparseable is replaced with now.
    pub fn normalize_timestamp(&mut self) {
        if self.timestamp.is_empty() {
            self.timestamp = Utc::now().to_rfc3339();
            return;
        }

        match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(parsed) => self.timestamp = parsed.with_timezone(&Utc).to_rfc3339(),
            Err(_) => {
                warn!(
                    timestamp = %self.timestamp,
                    "invalid timestamp in model response, using current time"
                );
                self.timestamp = Utc::now().to_rfc3339();
            }
        }
    }

    /// Rebuild a report from a stored JSON value, tolerating rows written
    /// before every field was mandatory.
    ///
    /// Missing fields get the same fallbacks the service has always applied
    /// on the read side: the row's own destination/origin, a generic embassy
    /// pointer, empty lists, and a fresh timestamp.
    pub fn from_stored(value: &serde_json::Value, destination: &str, origin: Option<&str>) -> Self {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(String::from);
        let list = |key: &str| {
            value.get(key).and_then(|v| v.as_array()).map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
        };

        Self {
            destination: text("destination").unwrap_or_else(|| destination.to_string()),
            origin: text("origin")
                .or_else(|| origin.map(String::from))
                .unwrap_or_else(|| "Not specified".to_string()),
            visa_requirements: text("visaRequirements").unwrap_or_else(|| UNAVAILABLE.to_string()),
            documents: list("documents").unwrap_or_default(),
            advisories: list("advisories").unwrap_or_default(),
            estimated_processing_time: text("estimatedProcessingTime")
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            embassy_information: text("embassyInformation").unwrap_or_else(|| {
                format!("Contact the {destination} embassy for more information")
            }),
            timestamp: text("timestamp").unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }
}
