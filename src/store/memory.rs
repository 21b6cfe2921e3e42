//! Ephemeral record store backed by a process-local map.
//!
//! Useful for tests and local experiments; records do not survive a restart.
//! The single `RwLock` over the map makes every mutation serializable, which
//! trivially satisfies the one-winner transition guarantee.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AnalysisOutcome, ImageRecord, ImageStatus, NewImage, StatsSnapshot};

use super::{validate_new_image, RecordStore};

/// In-memory record store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, ImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, image: NewImage) -> AppResult<ImageRecord> {
        validate_new_image(&image)?;

        let record = ImageRecord::new_pending(image.owner_id, image.filename, image.original_filename);
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord> {
        let records = self.records.read().await;
        records
            .get(&id)
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))
    }

    async fn list_completed(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> AppResult<(Vec<ImageRecord>, u64)> {
        let records = self.records.read().await;
        let mut completed: Vec<ImageRecord> = records
            .values()
            .filter(|record| record.status == ImageStatus::Completed)
            .filter(|record| owner.is_none_or(|owner_id| record.owner_id == owner_id))
            .cloned()
            .collect();

        // Newest first; id as tiebreaker for a stable order
        completed.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = completed.len() as u64;
        let offset = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
        let pageful = completed
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok((pageful, total))
    }

    async fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<ImageRecord>> {
        let records = self.records.read().await;
        let mut pending: Vec<ImageRecord> = records
            .values()
            .filter(|record| record.status == ImageStatus::Pending)
            .filter(|record| record.uploaded_at < older_than)
            .cloned()
            .collect();

        pending.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn transition(&self, id: Uuid, outcome: AnalysisOutcome) -> AppResult<ImageRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))?;

        // Check-and-write under the same write lock: losers of a race see a
        // terminal status here and are rejected, never overwritten.
        if record.status != ImageStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "image {} is already {}",
                id, record.status
            )));
        }

        record.apply_outcome(outcome);
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord> {
        let mut records = self.records.write().await;
        let owned = records
            .get(&id)
            .is_some_and(|record| record.owner_id == owner_id);
        if !owned {
            return Err(AppError::NotFound(format!("Image {}", id)));
        }
        records
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))
    }

    async fn stats(&self) -> AppResult<StatsSnapshot> {
        let records = self.records.read().await;
        let status_counts = records.values().map(|record| (record.status, 1u64));
        let risk_counts = records
            .values()
            .filter(|record| record.status == ImageStatus::Completed)
            .filter_map(|record| record.risk_level.map(|level| (level, 1u64)));

        Ok(StatsSnapshot::from_counts(status_counts, risk_counts))
    }
}
