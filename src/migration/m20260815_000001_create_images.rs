//! Migration: Create images table.
//!
//! One row per uploaded image. Result columns are NULL until the analysis
//! worker transitions the record to `completed`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE images (
                    id TEXT PRIMARY KEY, -- UUIDv7, time-ordered
                    owner_id TEXT NOT NULL,
                    filename TEXT NOT NULL,
                    original_filename TEXT NOT NULL,

                    -- Lifecycle status; completed and failed are terminal
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'completed', 'failed')),

                    -- Result columns, set exactly once on pending -> completed
                    risk_level TEXT
                        CHECK (risk_level IS NULL OR risk_level IN ('none', 'low', 'medium', 'high')),
                    risk_description TEXT,
                    detected_objects TEXT, -- JSON array of {name, confidence}
                    confidence_scores TEXT, -- JSON map of name -> {confidence}

                    uploaded_at TEXT NOT NULL,

                    -- pending rows carry no results; completed rows carry a level
                    CHECK (status != 'pending' OR risk_level IS NULL),
                    CHECK (status != 'failed' OR risk_level IS NULL),
                    CHECK (status != 'completed' OR risk_level IS NOT NULL)
                );

                -- Owner-scoped lookups
                CREATE INDEX idx_images_owner_id ON images(owner_id);

                -- Worker sweep over pending records
                CREATE INDEX idx_images_status ON images(status);

                -- Completed-analyses feed, newest first
                CREATE INDEX idx_images_status_uploaded_at ON images(status, uploaded_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS images;")
            .await?;

        Ok(())
    }
}
