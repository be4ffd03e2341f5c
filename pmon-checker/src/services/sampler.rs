//! Accuracy sampling
//!
//! Pulls the most recent recipes from a [`RecipeSource`] and draws a uniform
//! random sample without replacement. A source failure yields an empty
//! pool, which callers treat as "nothing to check".

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::SampledRecipe;
use crate::services::recipe_source::RecipeSource;

/// Default candidate pool size
pub const DEFAULT_POOL_SIZE: usize = 30;

/// Default sample size
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

pub struct Sampler {
    source: Arc<dyn RecipeSource>,
    pool_size: usize,
    sample_size: usize,
}

impl Sampler {
    pub fn new(source: Arc<dyn RecipeSource>) -> Self {
        Self::with_sizes(source, DEFAULT_POOL_SIZE, DEFAULT_SAMPLE_SIZE)
    }

    pub fn with_sizes(source: Arc<dyn RecipeSource>, pool_size: usize, sample_size: usize) -> Self {
        Self {
            source,
            pool_size,
            sample_size,
        }
    }

    /// Candidate pool: up to `pool_size` most recent recipes
    pub async fn candidate_pool(&self) -> Vec<SampledRecipe> {
        match self.source.recent_recipes(self.pool_size).await {
            Ok(mut recipes) => {
                recipes.truncate(self.pool_size);
                recipes
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "No recipe source available");
                Vec::new()
            }
        }
    }

    /// Random sample of at most `sample_size` recipes
    pub async fn sample(&self) -> Vec<SampledRecipe> {
        let pool = self.candidate_pool().await;
        let sample = draw_sample(pool, self.sample_size, &mut rand::thread_rng());

        info!(count = sample.len(), "Selected recipes for accuracy check");
        sample
    }
}

/// Uniform sample without replacement of `min(size, pool.len())` recipes
pub fn draw_sample<R: Rng + ?Sized>(
    pool: Vec<SampledRecipe>,
    size: usize,
    rng: &mut R,
) -> Vec<SampledRecipe> {
    let amount = size.min(pool.len());
    pool.choose_multiple(rng, amount).cloned().collect()
}
