//! Stored recipe shape read from the recipe sources

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A previously parsed recipe eligible for accuracy sampling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampledRecipe {
    #[serde(default)]
    pub url: Option<String>,

    /// `null` reads as no ingredients
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ingredients: Vec<IngredientEntry>,

    /// Insertion time as stored by the parser (ISO 8601 string)
    #[serde(default, rename = "dateAdded", skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
}

/// One parsed ingredient line
///
/// `amount` is stored as a number by some writers and as text by others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientEntry {
    #[serde(default, deserialize_with = "text_or_number")]
    pub amount: Option<String>,

    #[serde(default, deserialize_with = "text_or_number")]
    pub unit: Option<String>,

    #[serde(default, deserialize_with = "text_or_number")]
    pub name: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<IngredientEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<IngredientEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

impl IngredientEntry {
    /// Display line as a page would show it: non-empty parts joined by single spaces
    pub fn display_line(&self) -> String {
        [&self.amount, &self.unit, &self.name]
            .iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SampledRecipe {
    /// URL if present and non-blank
    pub fn live_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Parsed ingredient display lines, in stored order
    pub fn parsed_lines(&self) -> Vec<String> {
        self.ingredients.iter().map(IngredientEntry::display_line).collect()
    }
}
