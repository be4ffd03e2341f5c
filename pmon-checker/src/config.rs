//! Runtime wiring for pmon-checker
//!
//! Turns the bootstrap [`TomlConfig`] and the resolved root folder into the
//! concrete stores and services. Relative paths in the config are resolved
//! against the root folder.

use chrono::Duration as ChronoDuration;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use pmon_common::config::TomlConfig;
use pmon_common::{Error, Result};

use crate::services::accuracy_checker::AccuracyChecker;
use crate::services::live_fetcher::LiveFetcher;
use crate::services::pacing::PacingPolicy;
use crate::services::recipe_source::{
    DocumentStoreSource, FallbackRecipeSource, RecipeSource, SnapshotSource,
};
use crate::services::sampler::Sampler;
use crate::services::weekly_reporter::WeeklyReporter;

/// Filesystem locations after root-folder resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root_folder: PathBuf,
    pub database: PathBuf,
    pub snapshot: PathBuf,
    pub reports_dir: PathBuf,
}

impl ResolvedPaths {
    pub fn resolve(config: &TomlConfig, root_folder: &Path) -> Self {
        Self {
            root_folder: root_folder.to_path_buf(),
            database: config.resolve_path(root_folder, &config.database_path),
            snapshot: config.resolve_path(root_folder, &config.snapshot_path),
            reports_dir: config.resolve_path(root_folder, &config.reports_dir),
        }
    }
}

/// Primary document store, if one is configured and its client builds
pub fn primary_source(config: &TomlConfig) -> Option<Arc<dyn RecipeSource>> {
    let store = config.document_store.as_ref()?;
    match DocumentStoreSource::new(store) {
        Ok(source) => {
            info!(
                project = %store.project_id,
                collection = %store.collection,
                "Document store configured"
            );
            Some(Arc::new(source))
        }
        Err(e) => {
            warn!(error = %e, "Document store unavailable, using snapshot only");
            None
        }
    }
}

/// Recipe source for sampling: primary store with snapshot fallback
pub fn sampling_source(config: &TomlConfig, paths: &ResolvedPaths) -> Arc<dyn RecipeSource> {
    let snapshot: Arc<dyn RecipeSource> = Arc::new(SnapshotSource::new(paths.snapshot.clone()));
    Arc::new(FallbackRecipeSource::new(primary_source(config), snapshot))
}

/// Recipe source for report counts: the primary store when configured,
/// otherwise the snapshot
pub fn reporting_source(config: &TomlConfig, paths: &ResolvedPaths) -> Arc<dyn RecipeSource> {
    match primary_source(config) {
        Some(primary) => primary,
        None => Arc::new(SnapshotSource::new(paths.snapshot.clone())),
    }
}

pub fn build_accuracy_checker(
    db: SqlitePool,
    config: &TomlConfig,
    paths: &ResolvedPaths,
) -> Result<AccuracyChecker> {
    let settings = &config.accuracy;
    let fetcher = LiveFetcher::from_config(settings).map_err(|e| Error::Config(e.to_string()))?;

    let sampler = Sampler::with_sizes(
        sampling_source(config, paths),
        settings.pool_size,
        settings.sample_size,
    );

    let next_run_interval = if settings.next_run_interval_days > 0 {
        Some(ChronoDuration::days(settings.next_run_interval_days))
    } else {
        None
    };

    Ok(AccuracyChecker::new(db, sampler, Arc::new(fetcher))
        .with_pacing(PacingPolicy::from_secs_f64(settings.pacing_secs))
        .with_next_run_interval(next_run_interval))
}

pub fn build_weekly_reporter(
    db: SqlitePool,
    config: &TomlConfig,
    paths: &ResolvedPaths,
) -> WeeklyReporter {
    WeeklyReporter::new(
        db,
        reporting_source(config, paths),
        paths.reports_dir.clone(),
        config.report.clone(),
    )
}
