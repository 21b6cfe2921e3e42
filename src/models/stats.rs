//! Aggregate statistics model.
//!
//! A snapshot is ephemeral: recomputed from the record store on every query,
//! never persisted or cached.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::image::{ImageStatus, RiskLevel};

/// Count of records in one lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    pub status: ImageStatus,
    pub count: u64,
}

/// Count of completed records at one risk level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskCount {
    pub risk_level: RiskLevel,
    pub count: u64,
}

/// Point-in-time distributions over the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// All records grouped by status.
    pub status_distribution: Vec<StatusCount>,
    /// Completed records grouped by risk level.
    pub risk_distribution: Vec<RiskCount>,
}

impl StatsSnapshot {
    /// Build a snapshot from raw group counts, dropping zero-count groups.
    ///
    /// Accepts counts in any order; output is ordered pending/completed/failed
    /// and ascending risk severity so responses are stable across backends.
    pub fn from_counts(
        status_counts: impl IntoIterator<Item = (ImageStatus, u64)>,
        risk_counts: impl IntoIterator<Item = (RiskLevel, u64)>,
    ) -> Self {
        let mut by_status = std::collections::HashMap::new();
        for (status, count) in status_counts {
            *by_status.entry(status).or_insert(0u64) += count;
        }
        let mut by_risk = std::collections::HashMap::new();
        for (level, count) in risk_counts {
            *by_risk.entry(level).or_insert(0u64) += count;
        }

        let status_distribution = [
            ImageStatus::Pending,
            ImageStatus::Completed,
            ImageStatus::Failed,
        ]
        .into_iter()
        .filter_map(|status| {
            by_status
                .get(&status)
                .filter(|count| **count > 0)
                .map(|count| StatusCount {
                    status,
                    count: *count,
                })
        })
        .collect();

        let risk_distribution = RiskLevel::all()
            .into_iter()
            .filter_map(|level| {
                by_risk
                    .get(&level)
                    .filter(|count| **count > 0)
                    .map(|count| RiskCount {
                        risk_level: level,
                        count: *count,
                    })
            })
            .collect();

        StatsSnapshot {
            status_distribution,
            risk_distribution,
        }
    }

    fn status_count(&self, status: ImageStatus) -> u64 {
        self.status_distribution
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Count of records with status `completed`.
    pub fn total_completed(&self) -> u64 {
        self.status_count(ImageStatus::Completed)
    }

    /// Count of records with status `pending`.
    pub fn total_pending(&self) -> u64 {
        self.status_count(ImageStatus::Pending)
    }

    /// Completed records with no hazard (`risk_level = none`).
    pub fn safe_count(&self) -> u64 {
        self.risk_distribution
            .iter()
            .filter(|entry| !entry.risk_level.is_hazard())
            .map(|entry| entry.count)
            .sum()
    }

    /// Completed records with any hazard (`risk_level != none`).
    pub fn hazards_count(&self) -> u64 {
        self.risk_distribution
            .iter()
            .filter(|entry| entry.risk_level.is_hazard())
            .map(|entry| entry.count)
            .sum()
    }
}
