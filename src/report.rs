use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Machine-readable summary of one detection session.
#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub target: String,
    pub os: String,
    pub alive: bool,
    pub icmp_reachable: bool,
    pub last_open_port: Option<u16>,
    pub weights: BTreeMap<&'static str, u32>,
    pub detected_at: DateTime<Utc>,
}
