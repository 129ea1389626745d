//! Analytics snapshot and report derivation.
//!
//! The backend serves one pre-aggregated JSON document; everything shown in
//! the report is a pure function of that snapshot, recomputed per fetch.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Immutable analytics value fetched per refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub messages_per_hour: Vec<HourlyCount>,

    #[serde(default)]
    pub tool_usage: Vec<ToolUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    /// Tool name; missing or empty names are reported as "Unknown"
    #[serde(default)]
    pub tool: String,
    pub count: u64,
}

/// Aggregates derived from a snapshot. Never stored; recomputed per fetch.
#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    /// Sum of all hourly counts
    pub total_messages: u64,

    /// Entry with the maximum count; ties broken by first occurrence in
    /// the input ordering
    pub peak_hour: Option<HourlyCount>,

    /// Tool usage grouped by exact (case-sensitive) name, counts summed,
    /// in first-occurrence order
    pub tool_totals: Vec<ToolUsage>,
}

impl AnalyticsReport {
    pub fn derive(snapshot: &AnalyticsSnapshot) -> Self {
        let total_messages = snapshot.messages_per_hour.iter().map(|h| h.count).sum();

        // Strictly-greater comparison keeps the first occurrence on ties
        let mut peak_hour: Option<&HourlyCount> = None;
        for entry in &snapshot.messages_per_hour {
            match peak_hour {
                Some(best) if entry.count <= best.count => {}
                _ => peak_hour = Some(entry),
            }
        }

        let mut tool_totals: Vec<ToolUsage> = Vec::new();
        for usage in &snapshot.tool_usage {
            let name = if usage.tool.is_empty() {
                "Unknown"
            } else {
                usage.tool.as_str()
            };

            match tool_totals.iter_mut().find(|t| t.tool == name) {
                Some(existing) => existing.count += usage.count,
                None => tool_totals.push(ToolUsage {
                    tool: name.to_string(),
                    count: usage.count,
                }),
            }
        }

        Self {
            total_messages,
            peak_hour: peak_hour.cloned(),
            tool_totals,
        }
    }
}

/// Fetch the analytics snapshot.
///
/// Any transport failure or non-success status is an error; callers render
/// the error state only, never a partial report.
pub async fn fetch_snapshot(http: &reqwest::Client, endpoint: &str) -> Result<AnalyticsSnapshot> {
    let response = http
        .get(endpoint)
        .send()
        .await
        .context("Failed to reach analytics endpoint")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Analytics endpoint returned {}: {}", status, body);
    }

    response
        .json()
        .await
        .context("Malformed analytics snapshot")
}
