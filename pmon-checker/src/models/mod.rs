//! Data models for pmon-checker

pub mod recipe;

pub use recipe::{IngredientEntry, SampledRecipe};
