//! Accuracy monitoring services

pub mod accuracy_checker;
pub mod fuzzy_comparator;
pub mod live_fetcher;
pub mod pacing;
pub mod recipe_source;
pub mod run_gate;
pub mod sampler;
pub mod weekly_reporter;

pub use accuracy_checker::{AccuracyChecker, AccuracyRunOutcome, AccuracyRunSummary};
pub use fuzzy_comparator::{compare_ingredients, similarity_ratio};
pub use live_fetcher::{FetcherError, IngredientFetcher, LiveFetcher};
pub use pacing::PacingPolicy;
pub use recipe_source::{
    DocumentStoreSource, FallbackRecipeSource, RecipeSource, SnapshotSource, SourceError,
};
pub use run_gate::{RunGate, RunGuard, WEEKLY_REPORT_KEY};
pub use sampler::Sampler;
pub use weekly_reporter::{ReportError, WeeklyReporter};
