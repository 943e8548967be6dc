//! Testing utilities for the crafting engine.
//!
//! This module provides tools for integration testing:
//! - `MockProvider` for deterministic generation without API calls
//! - `TestHarness` for scripted sessions over in-memory storage
//! - Assertion helpers for verifying world state

use crate::concept::Concept;
use crate::generation::{GenerationPipeline, GenerationPrompt, GenerationProvider, ProviderError};
use crate::persist::{MemoryStorage, PersistenceAdapter, SavedWorld, STORAGE_KEY};
use crate::session::{GameSession, WorldProfile, WorldSession};
use crate::visual::WorldImage;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};

/// A provider that returns scripted responses.
///
/// Text calls pop the next scripted reply; once the script runs out every
/// call fails with [`ProviderError::Unavailable`].
#[derive(Debug, Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    image: Option<WorldImage>,
    /// Every prompt received, in order.
    prompts: Mutex<Vec<GenerationPrompt>>,
    calls: AtomicUsize,
    /// When set, text calls wait here until released.
    gate: Option<Semaphore>,
    entered: Notify,
}

impl MockProvider {
    /// A provider with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that fails every call.
    pub fn failing() -> Self {
        Self::new()
    }

    /// Answer image requests with `image`.
    pub fn with_image(mut self, image: WorldImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Hold each text call until [`MockProvider::release`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Queue a raw text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Ok(text.into()));
    }

    /// Queue a failed call.
    pub fn push_failure(&self, err: ProviderError) {
        lock(&self.replies).push_back(Err(err));
    }

    /// Wait until a text call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one held text call continue.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        lock(&self.prompts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate_text(&self, prompt: &GenerationPrompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.clone());
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        lock(&self.replies).pop_front().unwrap_or_else(|| {
            Err(ProviderError::Unavailable(
                "no scripted response".to_string(),
            ))
        })
    }

    async fn generate_image(&self, _prompt: &str) -> Result<WorldImage, ProviderError> {
        self.image
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("no scripted image".to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Test harness for running crafting scenarios.
pub struct TestHarness {
    /// The session under test.
    pub session: GameSession,
    /// The provider behind the session's pipeline.
    pub provider: Arc<MockProvider>,
    /// Where the session saves.
    pub storage: Arc<MemoryStorage>,
}

impl TestHarness {
    /// A fresh world for Cronos, god of Time, shaping Earth Prime.
    pub fn new() -> Self {
        Self::with_provider(MockProvider::new())
    }

    /// A fresh world generated by `provider`.
    pub fn with_provider(provider: MockProvider) -> Self {
        let provider = Arc::new(provider);
        let storage = Arc::new(MemoryStorage::new());
        let session = GameSession::new(
            default_profile(),
            pipeline(&provider),
            PersistenceAdapter::new(storage.clone()),
        );
        Self {
            session,
            provider,
            storage,
        }
    }

    /// Resume whatever world `storage` holds.
    pub async fn resume(storage: Arc<MemoryStorage>, provider: MockProvider) -> Self {
        let provider = Arc::new(provider);
        let session = GameSession::resume(
            default_profile(),
            pipeline(&provider),
            PersistenceAdapter::new(storage.clone()),
        )
        .await;
        Self {
            session,
            provider,
            storage,
        }
    }

    /// Queue a provider reply for the next novel combination.
    pub fn expect_concept(&self, name: &str, glyph: &str, description: &str) -> &Self {
        self.provider.push_text(
            serde_json::json!({
                "name": name,
                "glyph": glyph,
                "description": description,
            })
            .to_string(),
        );
        self
    }

    /// Combine two concepts by name, panicking on unknown names or errors.
    pub async fn combine_names(&self, a: &str, b: &str) -> crate::store::CombineResult {
        let a = self.concept_id(a);
        let b = self.concept_id(b);
        match self.session.combine(&a, &b).await {
            Ok(result) => result,
            Err(e) => panic!("combining {a} and {b} failed: {e}"),
        }
    }

    fn concept_id(&self, name: &str) -> String {
        match self.session.store().find_by_name(name) {
            Some(concept) => concept.id,
            None => panic!("no concept named '{name}'"),
        }
    }

    pub fn concept_count(&self) -> usize {
        self.session.store().len()
    }

    pub fn has_concept(&self, name: &str) -> bool {
        self.session.store().find_by_name(name).is_some()
    }

    pub fn concepts(&self) -> Vec<Concept> {
        self.session.concepts()
    }

    /// The world currently in storage, if a readable one exists.
    pub fn saved(&self) -> Option<WorldSession> {
        let raw = self.storage.raw(STORAGE_KEY)?;
        SavedWorld::from_json(&raw).ok().map(SavedWorld::into_session)
    }

    /// The newest chronicle message.
    pub fn last_chronicle(&self) -> Option<String> {
        self.session.chronicle().latest().map(|e| e.message)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn default_profile() -> WorldProfile {
    WorldProfile::new("Cronos", "Time", "Earth Prime")
}

fn pipeline(provider: &Arc<MockProvider>) -> GenerationPipeline {
    GenerationPipeline::new(provider.clone())
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the world contains a concept with the given name.
#[track_caller]
pub fn assert_has_concept(harness: &TestHarness, name: &str) {
    assert!(
        harness.has_concept(name),
        "Expected concept '{name}' to exist"
    );
}

/// Assert that the world does NOT contain a concept with the given name.
#[track_caller]
pub fn assert_no_concept(harness: &TestHarness, name: &str) {
    assert!(
        !harness.has_concept(name),
        "Expected concept '{name}' to NOT exist"
    );
}

/// Assert the number of known concepts.
#[track_caller]
pub fn assert_concept_count(harness: &TestHarness, expected: usize) {
    let actual = harness.concept_count();
    assert_eq!(actual, expected, "Expected {expected} concepts, got {actual}");
}

/// Assert that no two non-generic concepts share a lowercase name.
#[track_caller]
pub fn assert_unique_names(harness: &TestHarness) {
    let mut seen = HashSet::new();
    for concept in harness.concepts() {
        if crate::concept::is_generic_name(&concept.name) {
            continue;
        }
        assert!(
            seen.insert(concept.name_key()),
            "Concept name '{}' appears more than once",
            concept.name
        );
    }
}
