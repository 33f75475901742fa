// Billing-cycle traffic snapshot served on the webhook path

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Received/transmitted megabytes, rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficTotals {
    pub received_mb: f64,
    pub transmitted_mb: f64,
}

/// Aggregate traffic since `start_date`. Serializes as
/// `{"start_date": "YYYY-MM-DD", "in": <MB>, "out": <MB>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub start_date: NaiveDate,
    #[serde(rename = "in")]
    pub received_mb: f64,
    #[serde(rename = "out")]
    pub transmitted_mb: f64,
}

impl TrafficSnapshot {
    pub fn new(start_date: NaiveDate, totals: TrafficTotals) -> Self {
        Self {
            start_date,
            received_mb: totals.received_mb,
            transmitted_mb: totals.transmitted_mb,
        }
    }

    /// Zero traffic for a cycle nothing has been collected for yet.
    pub fn empty(start_date: NaiveDate) -> Self {
        Self::new(start_date, TrafficTotals::default())
    }
}
