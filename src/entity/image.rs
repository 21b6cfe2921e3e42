//! Image record entity for SeaORM.
//!
//! Ids are stored as their canonical hyphenated text form; SQLite has no
//! native UUID type. Enum columns hold the snake_case wire strings and are
//! CHECK-constrained in the migration.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub original_filename: String,
    /// Lifecycle status: pending, completed, failed
    pub status: String,
    /// Risk level: none, low, medium, high; NULL unless completed
    pub risk_level: Option<String>,
    pub risk_description: Option<String>,
    /// Ordered [{name, confidence}] array; NULL unless completed
    #[sea_orm(column_type = "Json", nullable)]
    pub detected_objects: Option<JsonValue>,
    /// {name: {confidence}} map; NULL unless completed
    #[sea_orm(column_type = "Json", nullable)]
    pub confidence_scores: Option<JsonValue>,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
