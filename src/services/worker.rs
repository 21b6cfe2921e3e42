//! Analysis worker: drives pending records to a terminal state.
//!
//! Two triggers share one processing path: a fire-and-forget task spawned
//! right after upload, and a periodic sweep that picks up pending records a
//! restart or lost task left behind. Claiming is the record store's guarded
//! `pending -> terminal` transition; a worker that loses that race simply
//! drops its result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::AnalysisOutcome;
use crate::services::analyzer::ImageAnalyzer;
use crate::services::files::FileStore;
use crate::store::SharedStore;

/// Shared handle to the configured analyzer.
pub type SharedAnalyzer = Arc<dyn ImageAnalyzer>;

/// Configuration for the pending-record sweep.
#[derive(Clone)]
pub struct SweepConfig {
    /// How often to sweep (seconds)
    pub interval_secs: u64,
    /// Only pick up records at least this old, so the sweep does not race
    /// freshly-triggered analyses in the common case (the transition guard
    /// stays the correctness backstop either way)
    pub min_age_secs: u64,
    /// Maximum records per sweep cycle
    pub batch_limit: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            min_age_secs: 60,
            batch_limit: 50,
        }
    }
}

/// Analyze one record and transition it to `completed` or `failed`.
///
/// Every processing error (missing file, unrecognizable payload, analyzer
/// failure) lands in the terminal `failed` state; there is no automatic
/// retry. Losing the transition race to another worker is a quiet no-op.
pub async fn process_image(
    store: &SharedStore,
    files: &FileStore,
    analyzer: &SharedAnalyzer,
    id: Uuid,
    filename: &str,
) {
    let outcome = match files.read(filename).await {
        Ok(bytes) => match analyzer.analyze(&bytes).await {
            Ok(analysis) => {
                debug!("Analysis of image {} complete: {}", id, analysis.risk_level);
                AnalysisOutcome::from(analysis)
            }
            Err(e) => {
                warn!("Analysis of image {} failed: {}", id, e);
                AnalysisOutcome::Failed
            }
        },
        Err(e) => {
            warn!("Could not read stored bytes for image {}: {}", id, e);
            AnalysisOutcome::Failed
        }
    };

    match store.transition(id, outcome).await {
        Ok(record) => info!("Image {} transitioned to {}", id, record.status),
        Err(AppError::InvalidTransition(_)) => {
            // Another worker claimed the record first; drop our result
            debug!("Lost transition race for image {}, skipping", id);
        }
        Err(e) => error!("Failed to record outcome for image {}: {}", id, e),
    }
}

/// Fire-and-forget analysis of a freshly uploaded record.
pub fn spawn_analysis(
    store: SharedStore,
    files: Arc<FileStore>,
    analyzer: SharedAnalyzer,
    id: Uuid,
    filename: String,
) {
    tokio::spawn(async move {
        process_image(&store, &files, &analyzer, id, &filename).await;
    });
}

/// Start the background sweep task.
///
/// Spawns a tokio task that periodically scans for stranded pending records
/// and processes them. The task runs for the life of the process.
pub fn start_sweep_task(
    store: SharedStore,
    files: Arc<FileStore>,
    analyzer: SharedAnalyzer,
    config: SweepConfig,
) {
    tokio::spawn(async move {
        info!(
            "Starting analysis sweep (interval: {}s, min age: {}s)",
            config.interval_secs, config.min_age_secs
        );

        let mut ticker = interval(Duration::from_secs(config.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = run_sweep(&store, &files, &analyzer, &config).await {
                error!("Analysis sweep error: {}", e);
            }
        }
    });
}

/// Run a single sweep cycle.
async fn run_sweep(
    store: &SharedStore,
    files: &Arc<FileStore>,
    analyzer: &SharedAnalyzer,
    config: &SweepConfig,
) -> Result<(), AppError> {
    let cutoff = Utc::now() - chrono::Duration::seconds(config.min_age_secs as i64);
    let stranded = store.list_pending(cutoff, config.batch_limit).await?;

    if stranded.is_empty() {
        return Ok(());
    }

    info!("Sweep found {} stranded pending records", stranded.len());

    for record in stranded {
        process_image(store, files, analyzer, record.id, &record.filename).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageStatus, NewImage, RiskLevel};
    use crate::services::analyzer::HeuristicAnalyzer;
    use crate::store::{MemoryStore, RecordStore};

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\x0arest-of-file";

    async fn fixture() -> (SharedStore, Arc<FileStore>, SharedAnalyzer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(FileStore::new(dir.path()));
        files.init().await.unwrap();
        let store: SharedStore = Arc::new(MemoryStore::new());
        let analyzer: SharedAnalyzer = Arc::new(HeuristicAnalyzer::new());
        (store, files, analyzer, dir)
    }

    async fn create_record(store: &SharedStore, filename: &str) -> Uuid {
        store
            .create(NewImage {
                owner_id: Uuid::new_v4(),
                filename: filename.to_string(),
                original_filename: "photo.png".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_valid_image_completes() {
        let (store, files, analyzer, _dir) = fixture().await;
        files.save("ok.png", PNG_HEADER).await.unwrap();
        let id = create_record(&store, "ok.png").await;

        process_image(&store, &files, &analyzer, id, "ok.png").await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_completed(), 1);
        assert_eq!(stats.total_pending(), 0);
        assert_eq!(stats.safe_count(), 1);
        assert_eq!(stats.hazards_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_payload_fails_terminally() {
        let (store, files, analyzer, _dir) = fixture().await;
        files.save("junk.bin", b"not an image").await.unwrap();
        let id = create_record(&store, "junk.bin").await;

        process_image(&store, &files, &analyzer, id, "junk.bin").await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_completed(), 0);
        assert_eq!(stats.total_pending(), 0);
        assert_eq!(stats.safe_count() + stats.hazards_count(), 0);

        // Failed records are excluded from the completed feed
        let (feed, total) = store.list_completed(None, 1, 10).await.unwrap();
        assert!(feed.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_missing_file_fails_terminally() {
        let (store, files, analyzer, _dir) = fixture().await;
        let id = create_record(&store, "vanished.png").await;

        process_image(&store, &files, &analyzer, id, "vanished.png").await;

        assert_eq!(store.stats().await.unwrap().total_pending(), 0);
    }

    #[tokio::test]
    async fn test_double_processing_is_a_noop() {
        let (store, files, analyzer, _dir) = fixture().await;
        files.save("ok.png", PNG_HEADER).await.unwrap();
        let id = create_record(&store, "ok.png").await;

        process_image(&store, &files, &analyzer, id, "ok.png").await;
        // Second attempt loses the claim and must not double-write
        process_image(&store, &files, &analyzer, id, "ok.png").await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_completed(), 1);
        assert_eq!(stats.safe_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_picks_up_stranded_records() {
        let (store, files, analyzer, _dir) = fixture().await;
        files.save("old.png", PNG_HEADER).await.unwrap();
        let id = create_record(&store, "old.png").await;

        // Zero minimum age makes the just-created record eligible immediately
        let config = SweepConfig {
            interval_secs: 1,
            min_age_secs: 0,
            batch_limit: 10,
        };
        run_sweep(&store, &files, &analyzer, &config).await.unwrap();

        let record = store
            .list_completed(None, 1, 10)
            .await
            .unwrap()
            .0
            .into_iter()
            .find(|record| record.id == id)
            .expect("record should be completed");
        assert_eq!(record.status, ImageStatus::Completed);
        assert_eq!(record.risk_level, Some(RiskLevel::None));
    }
}
