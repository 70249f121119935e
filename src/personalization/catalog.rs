//! Candidate supply
//!
//! The scorer never queries storage itself; the service asks a
//! [`CandidateSupplier`] for the current universe of recipes matching the
//! request's filters and hands the result to the scorer.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

use super::events::RecipeAttributes;

/// Request-level filters applied by the supplier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilter {
    #[serde(default)]
    pub cuisine: Option<String>,
    /// Every listed tag must be present on the recipe
    #[serde(default)]
    pub dietary_tags: BTreeSet<String>,
}

impl CandidateFilter {
    pub fn new(cuisine: Option<&str>, dietary_tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            cuisine: cuisine
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            dietary_tags: dietary_tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, recipe: &RecipeAttributes) -> bool {
        if let Some(cuisine) = &self.cuisine {
            if &recipe.cuisine != cuisine {
                return false;
            }
        }
        self.dietary_tags.iter().all(|t| recipe.tags.contains(t))
    }
}

/// Source of candidate recipes (typically a document-store query)
pub trait CandidateSupplier: Send + Sync {
    fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<RecipeAttributes>>;
}

/// Process-local catalog keyed by recipe id
#[derive(Default)]
pub struct InMemoryCatalog {
    recipes: RwLock<BTreeMap<String, RecipeAttributes>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_recipes(recipes: impl IntoIterator<Item = RecipeAttributes>) -> Self {
        let catalog = Self::new();
        catalog.upsert_many(recipes);
        catalog
    }

    /// Insert or replace a recipe. Returns true if it was new.
    pub fn upsert(&self, recipe: RecipeAttributes) -> bool {
        let recipe = recipe.normalized();
        self.recipes
            .write()
            .insert(recipe.recipe_id.clone(), recipe)
            .is_none()
    }

    /// Returns how many recipes were new
    pub fn upsert_many(&self, recipes: impl IntoIterator<Item = RecipeAttributes>) -> usize {
        let mut guard = self.recipes.write();
        recipes
            .into_iter()
            .map(RecipeAttributes::normalized)
            .filter(|r| !r.recipe_id.is_empty())
            .map(|r| guard.insert(r.recipe_id.clone(), r).is_none())
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn remove(&self, recipe_id: &str) -> bool {
        self.recipes.write().remove(recipe_id).is_some()
    }

    pub fn get(&self, recipe_id: &str) -> Option<RecipeAttributes> {
        self.recipes.read().get(recipe_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a JSON array of recipes, e.g.
    ///
    /// ```json
    /// [{"recipe_id": "r1", "cuisine": "italian", "ingredients": ["basil"],
    ///   "difficulty": "easy", "tags": ["vegetarian"]}]
    /// ```
    pub fn load_json_file(&self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file {}", path.display()))?;
        let recipes: Vec<RecipeAttributes> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse catalog file {}", path.display()))?;
        let total = recipes.len();
        let added = self.upsert_many(recipes);
        info!(path = %path.display(), total, added, "catalog loaded");
        Ok(total)
    }
}

impl CandidateSupplier for InMemoryCatalog {
    fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<RecipeAttributes>> {
        Ok(self
            .recipes
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_recipes([
            RecipeAttributes::new("r1", "italian").with_tags(["vegetarian"]),
            RecipeAttributes::new("r2", "italian").with_tags(["vegan", "vegetarian"]),
            RecipeAttributes::new("r3", "mexican"),
        ])
    }

    #[test]
    fn test_filter_by_cuisine_and_tags() {
        let catalog = catalog();
        let all = catalog.candidates(&CandidateFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let italian = catalog
            .candidates(&CandidateFilter::new(Some(" Italian "), []))
            .unwrap();
        assert_eq!(italian.len(), 2);

        let vegan = catalog
            .candidates(&CandidateFilter::new(
                Some("italian"),
                ["vegan".to_string(), "vegetarian".to_string()],
            ))
            .unwrap();
        assert_eq!(vegan.len(), 1);
        assert_eq!(vegan[0].recipe_id, "r2");
    }

    #[test]
    fn test_upsert_and_remove() {
        let catalog = catalog();
        assert!(!catalog.upsert(RecipeAttributes::new("r1", "greek")));
        assert_eq!(catalog.get("r1").unwrap().cuisine, "greek");
        assert!(catalog.remove("r3"));
        assert!(!catalog.remove("r3"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"recipe_id":"a","cuisine":"Thai","ingredients":["Basil"]}},
               {{"recipe_id":"b","cuisine":"thai","difficulty":"hard","tags":["spicy"]}}]"#
        )
        .unwrap();

        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.load_json_file(file.path()).unwrap(), 2);
        let a = catalog.get("a").unwrap();
        assert_eq!(a.cuisine, "thai");
        assert!(a.ingredients.contains("basil"));
    }

    #[test]
    fn test_load_json_file_reports_bad_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let catalog = InMemoryCatalog::new();
        assert!(catalog.load_json_file(file.path()).is_err());
        assert!(catalog
            .load_json_file(Path::new("/nonexistent/catalog.json"))
            .is_err());
    }
}
