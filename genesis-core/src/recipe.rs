//! Hand-authored recipes.
//!
//! A recipe fixes the outcome of a specific pair of concept names. Matches
//! bypass the generation provider entirely. Lookup is case-insensitive and
//! order-independent.

use crate::concept::{Candidate, Category};
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Recipes every world ships with: the four primitives combined with themselves.
    pub static ref DEFAULT_RECIPES: RecipeTable = RecipeTable::new()
        .with_recipe(
            "Water",
            "Water",
            Candidate::new("Life", "🧬", "Water met water and something began to stir.", Category::Animal),
        )
        .with_recipe(
            "Fire",
            "Fire",
            Candidate::new("Energy", "⚡", "Flame feeding on flame until it crackles with power.", Category::Science),
        )
        .with_recipe(
            "Earth",
            "Earth",
            Candidate::new("Mountain", "⛰️", "Ground pressed upon ground, rising toward the sky.", Category::Elements),
        )
        .with_recipe(
            "Air",
            "Air",
            Candidate::new("Sky", "🌌", "Endless air stacked into a vast open dome.", Category::Elements),
        );
}

/// Static lookup of fixed outcomes keyed by a normalized pair of names.
#[derive(Debug, Clone, Default)]
pub struct RecipeTable {
    recipes: HashMap<String, Candidate>,
}

impl RecipeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe, replacing any existing recipe for the same pair.
    pub fn with_recipe(mut self, a: &str, b: &str, outcome: Candidate) -> Self {
        self.insert(a, b, outcome);
        self
    }

    pub fn insert(&mut self, a: &str, b: &str, outcome: Candidate) {
        self.recipes.insert(recipe_key(a, b), outcome);
    }

    /// Find the recipe for two concept names, if one exists.
    pub fn lookup(&self, a: &str, b: &str) -> Option<&Candidate> {
        self.recipes.get(&recipe_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

fn recipe_key(a: &str, b: &str) -> String {
    let mut names = [a.trim().to_lowercase(), b.trim().to_lowercase()];
    names.sort();
    names.join("+")
}
