//! Durable record store backed by SQLite via SeaORM.
//!
//! The transition guard is a conditional `UPDATE ... WHERE status = 'pending'`
//! checked through `rows_affected`, so the one-winner guarantee holds even
//! with multiple server processes on the same database file.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, Statement,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::image::{self, ActiveModel, Column, Entity as Image};
use crate::error::{AppError, AppResult};
use crate::models::{
    AnalysisOutcome, ImageRecord, ImageStatus, NewImage, RiskLevel, StatsSnapshot,
};

use super::{validate_new_image, RecordStore};

/// SQLite-backed record store.
pub struct DatabaseStore {
    conn: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Fetch a row by id without owner scoping (worker-internal).
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<image::Model>> {
        let model = Image::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get image: {}", e)))?;
        Ok(model)
    }
}

#[async_trait::async_trait]
impl RecordStore for DatabaseStore {
    async fn create(&self, new: NewImage) -> AppResult<ImageRecord> {
        validate_new_image(&new)?;

        let record = ImageRecord::new_pending(new.owner_id, new.filename, new.original_filename);

        let model = ActiveModel {
            id: Set(record.id.to_string()),
            owner_id: Set(record.owner_id.to_string()),
            filename: Set(record.filename.clone()),
            original_filename: Set(record.original_filename.clone()),
            status: Set(record.status.as_str().to_string()),
            risk_level: Set(None),
            risk_description: Set(None),
            detected_objects: Set(None),
            confidence_scores: Set(None),
            uploaded_at: Set(record.uploaded_at),
        };

        Image::insert(model)
            .exec(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert image: {}", e)))?;

        Ok(record)
    }

    async fn get(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord> {
        let model = Image::find_by_id(id.to_string())
            .filter(Column::OwnerId.eq(owner_id.to_string()))
            .one(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get image: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))?;

        record_from_model(model)
    }

    async fn list_completed(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> AppResult<(Vec<ImageRecord>, u64)> {
        let mut select = Image::find().filter(Column::Status.eq(ImageStatus::Completed.as_str()));

        if let Some(owner_id) = owner {
            select = select.filter(Column::OwnerId.eq(owner_id.to_string()));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to count images: {}", e)))?;

        let offset = (page.saturating_sub(1) as u64) * (limit as u64);

        let models = select
            .order_by_desc(Column::UploadedAt)
            .order_by_desc(Column::Id)
            .offset(offset)
            .limit(limit as u64)
            .all(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list images: {}", e)))?;

        let records = models
            .into_iter()
            .map(record_from_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((records, total))
    }

    async fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<ImageRecord>> {
        let models = Image::find()
            .filter(Column::Status.eq(ImageStatus::Pending.as_str()))
            .filter(Column::UploadedAt.lt(older_than))
            .order_by_asc(Column::UploadedAt)
            .limit(limit as u64)
            .all(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list pending images: {}", e)))?;

        models.into_iter().map(record_from_model).collect()
    }

    async fn transition(&self, id: Uuid, outcome: AnalysisOutcome) -> AppResult<ImageRecord> {
        let update = match &outcome {
            AnalysisOutcome::Completed {
                risk_level,
                risk_description,
                detected_objects,
                confidence_scores,
            } => {
                let objects_json = serde_json::to_value(detected_objects)?;
                let scores_json = confidence_scores
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?;

                Image::update_many()
                    .col_expr(
                        Column::Status,
                        Expr::value(ImageStatus::Completed.as_str()),
                    )
                    .col_expr(Column::RiskLevel, Expr::value(risk_level.as_str()))
                    .col_expr(
                        Column::RiskDescription,
                        Expr::value(risk_description.clone()),
                    )
                    .col_expr(Column::DetectedObjects, Expr::value(objects_json))
                    .col_expr(Column::ConfidenceScores, Expr::value(scores_json))
            }
            AnalysisOutcome::Failed => Image::update_many().col_expr(
                Column::Status,
                Expr::value(ImageStatus::Failed.as_str()),
            ),
        };

        // The compare-and-set: only a row still pending takes the write.
        let result = update
            .filter(Column::Id.eq(id.to_string()))
            .filter(Column::Status.eq(ImageStatus::Pending.as_str()))
            .exec(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to transition image: {}", e)))?;

        if result.rows_affected == 0 {
            // Distinguish a missing record from a lost race
            return match self.find_by_id(id).await? {
                Some(model) => Err(AppError::InvalidTransition(format!(
                    "image {} is already {}",
                    id, model.status
                ))),
                None => Err(AppError::NotFound(format!("Image {}", id))),
            };
        }

        let model = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))?;
        record_from_model(model)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord> {
        let model = Image::find_by_id(id.to_string())
            .filter(Column::OwnerId.eq(owner_id.to_string()))
            .one(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get image: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Image {}", id)))?;

        let record = record_from_model(model)?;

        let result = Image::delete_many()
            .filter(Column::Id.eq(id.to_string()))
            .filter(Column::OwnerId.eq(owner_id.to_string()))
            .exec(&self.conn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete image: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Image {}", id)));
        }

        Ok(record)
    }

    async fn stats(&self) -> AppResult<StatsSnapshot> {
        #[derive(Debug, FromQueryResult)]
        struct StatusRow {
            status: String,
            count: i64,
        }

        #[derive(Debug, FromQueryResult)]
        struct RiskRow {
            risk_level: String,
            count: i64,
        }

        let status_rows: Vec<StatusRow> = StatusRow::find_by_statement(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "SELECT status, COUNT(*) as count FROM images GROUP BY status".to_owned(),
        ))
        .all(&self.conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to aggregate statuses: {}", e)))?;

        let risk_rows: Vec<RiskRow> = RiskRow::find_by_statement(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "SELECT risk_level, COUNT(*) as count FROM images \
             WHERE status = 'completed' AND risk_level IS NOT NULL \
             GROUP BY risk_level"
                .to_owned(),
        ))
        .all(&self.conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to aggregate risk levels: {}", e)))?;

        let status_counts = status_rows
            .into_iter()
            .filter_map(|row| ImageStatus::parse(&row.status).map(|s| (s, row.count as u64)));
        let risk_counts = risk_rows
            .into_iter()
            .filter_map(|row| RiskLevel::parse(&row.risk_level).map(|l| (l, row.count as u64)));

        Ok(StatsSnapshot::from_counts(status_counts, risk_counts))
    }
}

/// Convert a database row into the domain record.
///
/// Rows with unparseable ids or enum strings indicate corruption outside the
/// store contract and surface as database errors.
fn record_from_model(model: image::Model) -> AppResult<ImageRecord> {
    let id = Uuid::parse_str(&model.id)
        .map_err(|e| AppError::Database(format!("Corrupt image id '{}': {}", model.id, e)))?;
    let owner_id = Uuid::parse_str(&model.owner_id).map_err(|e| {
        AppError::Database(format!("Corrupt owner id '{}': {}", model.owner_id, e))
    })?;
    let status = ImageStatus::parse(&model.status)
        .ok_or_else(|| AppError::Database(format!("Corrupt status '{}'", model.status)))?;
    let risk_level = model
        .risk_level
        .as_deref()
        .map(|raw| {
            RiskLevel::parse(raw)
                .ok_or_else(|| AppError::Database(format!("Corrupt risk level '{}'", raw)))
        })
        .transpose()?;
    let detected_objects = model
        .detected_objects
        .map(parse_json_field)
        .transpose()?;
    let confidence_scores = model
        .confidence_scores
        .map(parse_json_field)
        .transpose()?;

    Ok(ImageRecord {
        id,
        owner_id,
        filename: model.filename,
        original_filename: model.original_filename,
        uploaded_at: model.uploaded_at,
        status,
        risk_level,
        risk_description: model.risk_description,
        detected_objects,
        confidence_scores,
    })
}

fn parse_json_field<T: serde::de::DeserializeOwned>(value: JsonValue) -> AppResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Database(format!("Corrupt JSON column: {}", e)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::migration::{Migrator, MigratorTrait};
    use crate::models::{ConfidenceScore, DetectedObject};

    async fn open_store() -> DatabaseStore {
        // A pool of one: every pooled connection to sqlite::memory: would
        // otherwise see its own empty database.
        let mut options = sea_orm::ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let conn = sea_orm::Database::connect(options)
            .await
            .expect("in-memory sqlite");
        Migrator::up(&conn, None).await.expect("migrations");
        DatabaseStore::new(conn)
    }

    fn new_image(owner_id: Uuid) -> NewImage {
        NewImage {
            owner_id,
            filename: format!("{}.jpg", Uuid::new_v4()),
            original_filename: "upload.jpg".to_string(),
        }
    }

    fn completed_outcome(level: RiskLevel) -> AnalysisOutcome {
        let mut scores = HashMap::new();
        scores.insert(
            "chainsaw".to_string(),
            ConfidenceScore { confidence: 0.77 },
        );
        AnalysisOutcome::Completed {
            risk_level: level,
            risk_description: "Power tool in frame".to_string(),
            detected_objects: vec![DetectedObject {
                name: "chainsaw".to_string(),
                confidence: 0.77,
            }],
            confidence_scores: Some(scores),
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_sqlite() {
        let store = open_store().await;
        let owner = Uuid::new_v4();
        let record = store.create(new_image(owner)).await.unwrap();

        let completed = store
            .transition(record.id, completed_outcome(RiskLevel::Medium))
            .await
            .unwrap();
        assert_eq!(completed.status, ImageStatus::Completed);
        assert_eq!(completed.risk_level, Some(RiskLevel::Medium));

        let fetched = store.get(record.id, owner).await.unwrap();
        assert_eq!(fetched, completed);
        let objects = fetched.detected_objects.unwrap();
        assert_eq!(objects[0].name, "chainsaw");
        assert!((objects[0].confidence - 0.77).abs() < f64::EPSILON);
        assert!(fetched
            .confidence_scores
            .unwrap()
            .contains_key("chainsaw"));
    }

    #[tokio::test]
    async fn test_transition_guard_rejects_terminal_records() {
        let store = open_store().await;
        let record = store.create(new_image(Uuid::new_v4())).await.unwrap();

        store
            .transition(record.id, AnalysisOutcome::Failed)
            .await
            .unwrap();

        let err = store
            .transition(record.id, completed_outcome(RiskLevel::None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let missing = store
            .transition(Uuid::new_v4(), AnalysisOutcome::Failed)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_single_winner() {
        let store = Arc::new(open_store().await);
        let record = store.create(new_image(Uuid::new_v4())).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = record.id;
            handles.push(tokio::spawn(async move {
                store.transition(id, AnalysisOutcome::Failed).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_owner_scoping_and_delete() {
        let store = open_store().await;
        let owner = Uuid::new_v4();
        let record = store.create(new_image(owner)).await.unwrap();

        let err = store.get(record.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = store.delete(record.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let removed = store.delete(record.id, owner).await.unwrap();
        assert_eq!(removed.id, record.id);
        assert!(matches!(
            store.get(record.id, owner).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_feed_pagination_and_stats() {
        let store = open_store().await;
        let owner = Uuid::new_v4();

        for i in 0..12 {
            let record = store.create(new_image(owner)).await.unwrap();
            let level = if i % 3 == 0 {
                RiskLevel::High
            } else {
                RiskLevel::None
            };
            store
                .transition(record.id, completed_outcome(level))
                .await
                .unwrap();
        }
        let failed = store.create(new_image(owner)).await.unwrap();
        store
            .transition(failed.id, AnalysisOutcome::Failed)
            .await
            .unwrap();
        let _pending = store.create(new_image(owner)).await.unwrap();

        let (page1, total) = store.list_completed(None, 1, 10).await.unwrap();
        let (page2, _) = store.list_completed(None, 2, 10).await.unwrap();
        assert_eq!(total, 12);
        assert_eq!(page1.len(), 10);
        assert_eq!(page2.len(), 2);
        assert!(page1
            .iter()
            .zip(page1.iter().skip(1))
            .all(|(a, b)| a.uploaded_at >= b.uploaded_at));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_completed(), 12);
        assert_eq!(stats.total_pending(), 1);
        assert_eq!(stats.safe_count(), 8);
        assert_eq!(stats.hazards_count(), 4);
        assert_eq!(
            stats.safe_count() + stats.hazards_count(),
            stats.total_completed()
        );
    }
}
