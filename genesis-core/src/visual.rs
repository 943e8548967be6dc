//! World visual regeneration.
//!
//! After the set of concepts changes, the world's picture can be redrawn.
//! The provider's image model is tried first; when it is unavailable a
//! keyword image URL is used instead, so a visual is always produced.

use crate::concept::Concept;
use crate::generation::GenerationProvider;
use rand::seq::SliceRandom;

/// Keyword image service used when no image model is reachable.
pub const FALLBACK_IMAGE_BASE: &str = "https://loremflickr.com/1024/1024/space,planet,";

/// Rendered image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// The current picture of the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldVisual {
    Rendered(WorldImage),
    Url(String),
}

impl WorldVisual {
    pub fn is_rendered(&self) -> bool {
        matches!(self, WorldVisual::Rendered(_))
    }
}

/// Image prompt for a world and its discovered concepts.
pub fn visual_prompt(world_name: &str, concepts: &[Concept]) -> String {
    let names = concepts
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "majestic planet {world_name}, {names} landscape, cinematic lighting, photorealistic, 8k, space background"
    )
}

/// Keyword image URL built from one random concept name.
///
/// The timestamp defeats caching so each call yields a fresh picture.
pub fn fallback_url(concepts: &[Concept]) -> String {
    let keyword = concepts
        .choose(&mut rand::thread_rng())
        .map(|c| c.name.as_str())
        .unwrap_or("planet");
    let lock = chrono::Utc::now().timestamp_millis();
    format!(
        "{FALLBACK_IMAGE_BASE}{}?lock={lock}",
        urlencoding::encode(keyword)
    )
}

/// Produce a visual for the world. Never fails.
pub async fn regenerate(
    provider: &dyn GenerationProvider,
    world_name: &str,
    concepts: &[Concept],
) -> WorldVisual {
    let prompt = visual_prompt(world_name, concepts);
    match provider.generate_image(&prompt).await {
        Ok(image) => WorldVisual::Rendered(image),
        Err(err) => {
            tracing::warn!(provider = provider.name(), error = %err, "image generation failed, using keyword image");
            WorldVisual::Url(fallback_url(concepts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::primitives;
    use crate::testing::MockProvider;

    #[test]
    fn test_visual_prompt() {
        let prompt = visual_prompt("Earth Prime", &primitives());
        assert!(prompt.starts_with("majestic planet Earth Prime, Air, Water, Earth, Fire landscape"));
    }

    #[test]
    fn test_fallback_url_uses_a_concept_name() {
        let concepts = primitives();
        let url = fallback_url(&concepts);
        assert!(url.starts_with(FALLBACK_IMAGE_BASE));
        assert!(url.contains("?lock="));
        assert!(concepts.iter().any(|c| url.contains(&c.name)));
    }

    #[test]
    fn test_fallback_url_without_concepts() {
        assert!(fallback_url(&[]).contains("planet?lock="));
    }

    #[test]
    fn test_fallback_url_encodes_keyword() {
        let concepts = vec![Concept {
            id: "fire-water".to_string(),
            name: "Hot Spring & Co".to_string(),
            glyph: "♨️".to_string(),
            description: String::new(),
            category: Default::default(),
        }];
        let url = fallback_url(&concepts);
        assert!(url.starts_with(&format!("{FALLBACK_IMAGE_BASE}Hot%20Spring%20%26%20Co?lock=")));
    }

    #[tokio::test]
    async fn test_regenerate_prefers_rendered_image() {
        let provider = MockProvider::new().with_image(WorldImage {
            media_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        });
        let visual = regenerate(&provider, "Gaia", &primitives()).await;
        assert!(visual.is_rendered());
    }

    #[tokio::test]
    async fn test_regenerate_falls_back_to_url() {
        let provider = MockProvider::failing();
        let visual = regenerate(&provider, "Gaia", &primitives()).await;
        assert!(matches!(visual, WorldVisual::Url(url) if url.starts_with(FALLBACK_IMAGE_BASE)));
    }
}
