//! Business logic services.

pub mod analyzer;
pub mod files;
pub mod upload;
pub mod worker;

pub use analyzer::{HeuristicAnalyzer, ImageAnalyzer};
pub use files::FileStore;
pub use upload::configure_upload_routes;
pub use worker::{start_sweep_task, SharedAnalyzer, SweepConfig};
