//! Candidate generation.
//!
//! The pipeline turns two source concepts into a [`Candidate`] using, in
//! strict priority order:
//!
//! 1. the [`RecipeTable`] (hand-authored outcomes),
//! 2. the remote [`GenerationProvider`], whose free-form answer is cut down
//!    to a JSON object, repaired and parsed,
//! 3. a deterministic local placeholder.
//!
//! The last tier cannot fail, so [`GenerationPipeline::generate`] always
//! returns a usable candidate. Provider and parse failures are reported
//! through [`Provenance::Fallback`] instead of an error.

use crate::concept::{Candidate, Category, Concept};
use crate::recipe::{RecipeTable, DEFAULT_RECIPES};
use crate::session::WorldProfile;
use crate::visual::WorldImage;
use async_trait::async_trait;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Keys whose values providers are known to leave unquoted.
const GLYPH_KEYS: [&str; 2] = ["glyph", "emoji"];

/// Errors from a generation provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unreadable provider response: {0}")]
    BadResponse(String),

    #[error("operation not supported by this provider")]
    Unsupported,
}

/// Why the remote tier did not produce a candidate.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Prompt handed to a [`GenerationProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    /// Instruction payload describing the game and the answer format.
    pub system: String,
    /// The combination request itself.
    pub user: String,
}

/// An external service that invents new concepts.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate free-form text expected to contain one JSON object.
    async fn generate_text(&self, prompt: &GenerationPrompt) -> Result<String, ProviderError>;

    /// Render an image of the world.
    async fn generate_image(&self, _prompt: &str) -> Result<WorldImage, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Which tier produced a candidate.
#[derive(Debug, Clone)]
pub enum Provenance {
    Recipe,
    Provider,
    Fallback(GenerationError),
}

impl Provenance {
    /// Whether the candidate came from the local placeholder tier.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback(_))
    }
}

/// A candidate together with the tier that produced it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub candidate: Candidate,
    pub provenance: Provenance,
}

/// Recipe → provider → local placeholder.
#[derive(Clone)]
pub struct GenerationPipeline {
    recipes: RecipeTable,
    provider: Arc<dyn GenerationProvider>,
    presentation_delay: Duration,
}

impl GenerationPipeline {
    /// Create a pipeline with the default recipes and no presentation delay.
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            recipes: DEFAULT_RECIPES.clone(),
            provider,
            presentation_delay: Duration::ZERO,
        }
    }

    /// Replace the recipe table.
    pub fn with_recipes(mut self, recipes: RecipeTable) -> Self {
        self.recipes = recipes;
        self
    }

    /// Pause applied before returning recipe and placeholder results, so
    /// they do not appear faster than real generation. Zero disables it.
    pub fn with_presentation_delay(mut self, delay: Duration) -> Self {
        self.presentation_delay = delay;
        self
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    pub fn recipes(&self) -> &RecipeTable {
        &self.recipes
    }

    /// Produce a candidate for combining `source` with `target`.
    ///
    /// Never fails: every provider or parsing problem ends in the generic
    /// placeholder candidate.
    pub async fn generate(
        &self,
        profile: &WorldProfile,
        source: &Concept,
        target: &Concept,
    ) -> Generation {
        if let Some(recipe) = self.recipes.lookup(&source.name, &target.name) {
            tracing::debug!(source = %source.name, target = %target.name, result = %recipe.name, "recipe matched");
            let candidate = recipe.clone();
            self.pace().await;
            return Generation {
                candidate,
                provenance: Provenance::Recipe,
            };
        }

        match self.generate_remote(profile, source, target).await {
            Ok(candidate) => Generation {
                candidate,
                provenance: Provenance::Provider,
            },
            Err(err) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    source = %source.name,
                    target = %target.name,
                    error = %err,
                    "generation failed, using local placeholder"
                );
                self.pace().await;
                Generation {
                    candidate: Candidate::generic(&source.name, &target.name),
                    provenance: Provenance::Fallback(err),
                }
            }
        }
    }

    async fn generate_remote(
        &self,
        profile: &WorldProfile,
        source: &Concept,
        target: &Concept,
    ) -> Result<Candidate, GenerationError> {
        let prompt = build_prompt(profile, &source.name, &target.name);
        let raw = self.provider.generate_text(&prompt).await?;
        parse_candidate(&raw)
    }

    async fn pace(&self) {
        if !self.presentation_delay.is_zero() {
            tokio::time::sleep(self.presentation_delay).await;
        }
    }
}

/// Build the provider prompt for one combination.
pub fn build_prompt(profile: &WorldProfile, source: &str, target: &str) -> GenerationPrompt {
    let categories = Category::BUCKETS
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        "You are the game engine for 'Godly Powers', a world creation game.\n\
         The player is the god {actor}, whose powers are: {powers}.\n\
         They are shaping the planet {world} and are combining two elements: {source} and {target}.\n\
         Based on the combination and the god's powers, invent a NEW element.\n\
         Return ONLY a JSON object in this format (no markdown, no other text):\n\
         {{\n  \
           \"name\": \"Creative Name\",\n  \
           \"glyph\": \"Relevant Emoji\",\n  \
           \"description\": \"Short flavor text describing the creation\",\n  \
           \"category\": \"one of: {categories}\"\n\
         }}",
        actor = profile.actor_name,
        powers = profile.actor_trait,
        world = profile.world_name,
    );

    GenerationPrompt {
        system,
        user: format!("Combine {source} and {target}"),
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    name: String,
    #[serde(alias = "emoji")]
    glyph: String,
    description: String,
    #[serde(default)]
    category: Option<String>,
}

/// Turn a raw provider answer into a candidate.
pub fn parse_candidate(raw: &str) -> Result<Candidate, GenerationError> {
    let object = extract_object(raw)
        .ok_or_else(|| GenerationError::MalformedPayload("no JSON object in response".into()))?;
    let repaired = repair_payload(object);

    let payload: Payload = serde_json::from_str(&repaired)
        .map_err(|e| GenerationError::MalformedPayload(e.to_string()))?;

    let name = payload.name.trim();
    let glyph = payload.glyph.trim();
    if name.is_empty() {
        return Err(GenerationError::MalformedPayload("empty name".into()));
    }
    if glyph.is_empty() {
        return Err(GenerationError::MalformedPayload("empty glyph".into()));
    }

    Ok(Candidate {
        name: name.to_string(),
        glyph: glyph.to_string(),
        description: payload.description.trim().to_string(),
        category: payload
            .category
            .as_deref()
            .map(Category::parse)
            .unwrap_or_default(),
    })
}

/// Find the first `{ ... }` object in a response that may carry prose around it.
///
/// Braces inside string literals are ignored. If the object never closes,
/// everything up to the last `}` is returned instead.
pub fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let body = &raw[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in body.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }

    body.rfind('}').map(|end| &body[..=end])
}

/// Quote bare scalar values following a glyph key.
///
/// `{"name": "Mist", "glyph": 🌫, ...}` becomes
/// `{"name": "Mist", "glyph": "🌫", ...}`. Anything else is left untouched.
pub fn repair_payload(payload: &str) -> Cow<'_, str> {
    let mut repaired: Option<String> = None;

    for key in GLYPH_KEYS {
        let current = repaired.as_deref().unwrap_or(payload);
        if let Some(fixed) = quote_bare_value(current, key) {
            repaired = Some(fixed);
        }
    }

    match repaired {
        Some(fixed) => Cow::Owned(fixed),
        None => Cow::Borrowed(payload),
    }
}

fn quote_bare_value(payload: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\"");
    let mut out = String::with_capacity(payload.len() + 2);
    let mut rest = payload;
    let mut changed = false;

    while let Some(pos) = rest.find(&needle) {
        let after_key = pos + needle.len();
        out.push_str(&rest[..after_key]);
        rest = &rest[after_key..];

        let Some(after_colon) = rest.trim_start().strip_prefix(':') else {
            continue;
        };
        let value = after_colon.trim_start();
        let prefix_len = rest.len() - value.len();
        out.push_str(&rest[..prefix_len]);
        rest = value;

        if matches!(value.chars().next(), None | Some('"' | '{' | '[')) {
            continue;
        }

        let end = value.find([',', '}', '\n', '\r']).unwrap_or(value.len());
        let scalar = value[..end].trim_end();
        if scalar.is_empty() {
            continue;
        }

        out.push('"');
        for ch in scalar.chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
        out.push_str(&value[scalar.len()..end]);
        rest = &value[end..];
        changed = true;
    }

    out.push_str(rest);
    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::{primitives, GENERIC_GLYPH};
    use crate::testing::MockProvider;

    fn profile() -> WorldProfile {
        WorldProfile::new("Cronos", "Time and tides", "Earth Prime")
    }

    fn concept(name: &str) -> Concept {
        primitives()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    }

    #[test]
    fn test_parse_clean_payload() {
        let candidate = parse_candidate(
            r#"{"name":"Mist","glyph":"🌫","description":"Damp air","category":"elements"}"#,
        )
        .unwrap();
        assert_eq!(candidate.name, "Mist");
        assert_eq!(candidate.glyph, "🌫");
        assert_eq!(candidate.category, Category::Elements);
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let raw = "Sure! Here is your element:\n```json\n{\"name\": \"Steam\", \"emoji\": \"♨️\", \"description\": \"Hot {vapor}\"}\n```\nEnjoy {the game}!";
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.name, "Steam");
        assert_eq!(candidate.glyph, "♨️");
        assert_eq!(candidate.description, "Hot {vapor}");
        assert_eq!(candidate.category, Category::Unclassified);
    }

    #[test]
    fn test_parse_repairs_unquoted_glyph() {
        let raw = r#"{"name": "Mist", "glyph": 🌫, "description": "Damp air"}"#;
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.glyph, "🌫");
    }

    #[test]
    fn test_parse_repairs_unquoted_glyph_last_key() {
        let raw = "{\n  \"name\": \"Ash\",\n  \"description\": \"What fire leaves\",\n  \"emoji\": 🌋\n}";
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.glyph, "🌋");
        assert_eq!(candidate.name, "Ash");
    }

    #[test]
    fn test_unknown_category_is_unclassified() {
        let candidate = parse_candidate(
            r#"{"name":"Rain","glyph":"🌧","description":"","category":"weather"}"#,
        )
        .unwrap();
        assert_eq!(candidate.category, Category::Unclassified);
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let err = parse_candidate(r#"{"name":"Mist","description":"no glyph"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedPayload(_)));
    }

    #[test]
    fn test_parse_rejects_blank_name() {
        let err = parse_candidate(r#"{"name":"  ","glyph":"x","description":""}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedPayload(_)));
    }

    #[test]
    fn test_parse_rejects_prose_only() {
        assert!(parse_candidate("I cannot help with that.").is_err());
    }

    #[test]
    fn test_extract_object_unclosed_uses_last_brace() {
        assert_eq!(extract_object("x {\"a\": {\"b\": 1} y"), Some("{\"a\": {\"b\": 1}"));
        assert_eq!(extract_object("no braces"), None);
    }

    #[test]
    fn test_repair_leaves_valid_payload_borrowed() {
        let payload = r#"{"glyph": "🔥"}"#;
        assert!(matches!(repair_payload(payload), Cow::Borrowed(_)));
    }

    #[test]
    fn test_repair_escapes_quotes() {
        let repaired = repair_payload(r#"{"glyph": a"b}"#);
        assert_eq!(repaired, r#"{"glyph": "a\"b"}"#);
    }

    #[test]
    fn test_prompt_mentions_context() {
        let prompt = build_prompt(&profile(), "Air", "Water");
        assert!(prompt.system.contains("Cronos"));
        assert!(prompt.system.contains("Time and tides"));
        assert!(prompt.system.contains("Earth Prime"));
        assert!(prompt.system.contains("Air and Water"));
        assert!(prompt.system.contains("mankind"));
        assert_eq!(prompt.user, "Combine Air and Water");
    }

    #[tokio::test]
    async fn test_recipe_short_circuits_provider() {
        let provider = Arc::new(MockProvider::new());
        let pipeline = GenerationPipeline::new(provider.clone());

        let water = concept("Water");
        let generation = pipeline.generate(&profile(), &water, &water).await;

        assert_eq!(generation.candidate.name, "Life");
        assert!(matches!(generation.provenance, Provenance::Recipe));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_result_used() {
        let provider = Arc::new(MockProvider::new());
        provider.push_text(r#"Here: {"name":"Mist","glyph":"🌫","description":"Damp air"}"#);
        let pipeline = GenerationPipeline::new(provider.clone());

        let generation = pipeline
            .generate(&profile(), &concept("Air"), &concept("Water"))
            .await;

        assert_eq!(generation.candidate.name, "Mist");
        assert!(matches!(generation.provenance, Provenance::Provider));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.prompts()[0].user, "Combine Air and Water");
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let provider = Arc::new(MockProvider::failing());
        let pipeline = GenerationPipeline::new(provider);

        let generation = pipeline
            .generate(&profile(), &concept("Air"), &concept("Fire"))
            .await;

        assert_eq!(generation.candidate.name, "Essence of Air & Fire");
        assert_eq!(generation.candidate.glyph, GENERIC_GLYPH);
        assert_eq!(generation.candidate.category, Category::Ideas);
        assert!(matches!(
            generation.provenance,
            Provenance::Fallback(GenerationError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload_falls_back() {
        let provider = Arc::new(MockProvider::new());
        provider.push_text("The elements refuse to merge.");
        let pipeline = GenerationPipeline::new(provider);

        let generation = pipeline
            .generate(&profile(), &concept("Earth"), &concept("Fire"))
            .await;

        assert!(generation.candidate.is_generic());
        assert!(matches!(
            generation.provenance,
            Provenance::Fallback(GenerationError::MalformedPayload(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_presentation_delay_applies_to_recipes() {
        let pipeline = GenerationPipeline::new(Arc::new(MockProvider::new()))
            .with_presentation_delay(Duration::from_millis(800));

        let fire = concept("Fire");
        let started = tokio::time::Instant::now();
        let generation = pipeline.generate(&profile(), &fire, &fire).await;

        assert_eq!(generation.candidate.name, "Energy");
        assert!(started.elapsed() >= Duration::from_millis(800));
    }
}
