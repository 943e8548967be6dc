//! Concepts, categories and generation candidates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the generic name given to locally-generated fallback concepts.
pub const GENERIC_NAME_PREFIX: &str = "Essence of ";
/// Glyph used by locally-generated fallback concepts.
pub const GENERIC_GLYPH: &str = "✨";
/// Description used by locally-generated fallback concepts.
pub const GENERIC_DESCRIPTION: &str = "A new manifestation created by your will.";

/// Classification of a concept.
///
/// `Unclassified` is what a concept carries when nothing assigned it a
/// category. It is only folded into [`Category::Ideas`] for grouping, via
/// [`Category::bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Elements,
    Animal,
    Mankind,
    Ideas,
    Science,
    #[default]
    Unclassified,
}

impl Category {
    /// The five display buckets, in display order.
    pub const BUCKETS: [Category; 5] = [
        Category::Elements,
        Category::Animal,
        Category::Mankind,
        Category::Ideas,
        Category::Science,
    ];

    /// Parse a category name. Unknown or empty names are `Unclassified`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "elements" | "element" => Category::Elements,
            "animal" | "animals" => Category::Animal,
            "mankind" => Category::Mankind,
            "ideas" | "idea" => Category::Ideas,
            "science" => Category::Science,
            _ => Category::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Elements => "elements",
            Category::Animal => "animal",
            Category::Mankind => "mankind",
            Category::Ideas => "ideas",
            Category::Science => "science",
            Category::Unclassified => "unclassified",
        }
    }

    /// The bucket this category is grouped under for display.
    pub fn bucket(&self) -> Category {
        match self {
            Category::Unclassified => Category::Ideas,
            other => *other,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Category::Unclassified)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::parse(&s)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// A discovered (or primitive) entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Stable id. Derived concepts use the combination key that produced them.
    pub id: String,

    /// Display name, unique (case-insensitive) within a store.
    pub name: String,

    /// Short display symbol.
    #[serde(alias = "emoji")]
    pub glyph: String,

    /// Short flavor text.
    pub description: String,

    /// Classification; absent in the record when unclassified.
    #[serde(default, skip_serializing_if = "Category::is_unclassified")]
    pub category: Category,
}

impl Concept {
    /// Build a concept from a generation candidate.
    pub fn from_candidate(id: impl Into<String>, candidate: Candidate) -> Self {
        Self {
            id: id.into(),
            name: candidate.name,
            glyph: candidate.glyph,
            description: candidate.description,
            category: candidate.category,
        }
    }

    /// Lowercased name used for uniqueness checks.
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A freshly generated concept payload that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub glyph: String,
    pub description: String,
    pub category: Category,
}

impl Candidate {
    pub fn new(
        name: impl Into<String>,
        glyph: impl Into<String>,
        description: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            name: name.into(),
            glyph: glyph.into(),
            description: description.into(),
            category,
        }
    }

    /// The generic placeholder produced when generation is unavailable.
    pub fn generic(source: &str, target: &str) -> Self {
        Self {
            name: generic_name(source, target),
            glyph: GENERIC_GLYPH.to_string(),
            description: GENERIC_DESCRIPTION.to_string(),
            category: Category::Ideas,
        }
    }

    /// Whether this candidate uses the generic placeholder naming pattern.
    pub fn is_generic(&self) -> bool {
        is_generic_name(&self.name)
    }
}

/// Generic placeholder name for a pair of concept names.
pub fn generic_name(source: &str, target: &str) -> String {
    format!("{GENERIC_NAME_PREFIX}{source} & {target}")
}

/// Whether a name follows the generic placeholder pattern.
///
/// Generic names are exempt from the store's name-uniqueness rule.
pub fn is_generic_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower
        .strip_prefix(&GENERIC_NAME_PREFIX.to_lowercase())
        .is_some_and(|rest| rest.contains(" & "))
}

/// The four concepts every world starts with.
pub fn primitives() -> Vec<Concept> {
    [
        ("air", "Air", "💨", "Gaseous substances"),
        ("water", "Water", "💧", "Liquid life"),
        ("earth", "Earth", "🌱", "Solid ground"),
        ("fire", "Fire", "🔥", "Energy and heat"),
    ]
    .into_iter()
    .map(|(id, name, glyph, description)| Concept {
        id: id.to_string(),
        name: name.to_string(),
        glyph: glyph.to_string(),
        description: description.to_string(),
        category: Category::Elements,
    })
    .collect()
}

/// Whether an id names one of the primitives.
pub fn is_primitive_id(id: &str) -> bool {
    matches!(id, "air" | "water" | "earth" | "fire")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Animal"), Category::Animal);
        assert_eq!(Category::parse(" science "), Category::Science);
        assert_eq!(Category::parse("weather"), Category::Unclassified);
        assert_eq!(Category::parse(""), Category::Unclassified);
    }

    #[test]
    fn test_unclassified_buckets_into_ideas() {
        assert_eq!(Category::Unclassified.bucket(), Category::Ideas);
        assert_eq!(Category::Animal.bucket(), Category::Animal);
    }

    #[test]
    fn test_primitives() {
        let primitives = primitives();
        let names: Vec<_> = primitives.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Air", "Water", "Earth", "Fire"]);
        assert!(primitives.iter().all(|c| c.category == Category::Elements));
        assert!(primitives.iter().all(|c| is_primitive_id(&c.id)));
    }

    #[test]
    fn test_generic_candidate() {
        let candidate = Candidate::generic("Air", "Fire");
        assert_eq!(candidate.name, "Essence of Air & Fire");
        assert_eq!(candidate.glyph, GENERIC_GLYPH);
        assert_eq!(candidate.category, Category::Ideas);
        assert!(candidate.is_generic());
    }

    #[test]
    fn test_generic_name_detection() {
        assert!(is_generic_name("essence of mist & stone"));
        assert!(!is_generic_name("Essence"));
        assert!(!is_generic_name("Essence of Mist"));
        assert!(!is_generic_name("Mist & Stone"));
    }

    #[test]
    fn test_concept_serialization_omits_unclassified() {
        let concept = Concept {
            id: "air-water".to_string(),
            name: "Mist".to_string(),
            glyph: "🌫".to_string(),
            description: "Damp air".to_string(),
            category: Category::Unclassified,
        };
        let json = serde_json::to_value(&concept).unwrap();
        assert!(json.get("category").is_none());

        let back: Concept = serde_json::from_value(json).unwrap();
        assert_eq!(back, concept);
    }

    #[test]
    fn test_concept_accepts_emoji_key() {
        let concept: Concept = serde_json::from_str(
            r#"{"id":"fire","name":"Fire","emoji":"🔥","description":"Energy and heat","category":"elements"}"#,
        )
        .unwrap();
        assert_eq!(concept.glyph, "🔥");
        assert_eq!(concept.category, Category::Elements);
    }
}
