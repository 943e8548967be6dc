//! GameSession - the primary public API for world crafting.
//!
//! A session owns the discovery store, the generation pipeline, the
//! persistence adapter and the chronicle, and runs every combination
//! through them in order: store check, generation, commit, save, record.

use crate::chronicle::Chronicle;
use crate::concept::Concept;
use crate::config::EngineConfig;
use crate::generation::{GenerationPipeline, Provenance};
use crate::persist::{FileStorage, PersistError, PersistenceAdapter};
use crate::provider::WorkersAiProvider;
use crate::store::{CombineError, CombineResult, DiscoveryStore};
use crate::visual::{self, WorldVisual};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Combination error: {0}")]
    Combine(#[from] CombineError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Who is shaping which world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldProfile {
    /// The player's divine name.
    pub actor_name: String,

    /// Free-text description of the player's powers.
    pub actor_trait: String,

    /// Name of the planet being shaped.
    pub world_name: String,
}

impl WorldProfile {
    pub fn new(
        actor_name: impl Into<String>,
        actor_trait: impl Into<String>,
        world_name: impl Into<String>,
    ) -> Self {
        Self {
            actor_name: actor_name.into(),
            actor_trait: actor_trait.into(),
            world_name: world_name.into(),
        }
    }
}

/// A world as a plain value: its profile plus every concept discovered.
///
/// This is the unit of persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSession {
    pub profile: WorldProfile,
    pub concepts: Vec<Concept>,
}

impl WorldSession {
    /// Same profile and the same concepts, in any order.
    pub fn equivalent(&self, other: &WorldSession) -> bool {
        if self.profile != other.profile || self.concepts.len() != other.concepts.len() {
            return false;
        }
        let mut ours: Vec<_> = self.concepts.iter().collect();
        let mut theirs: Vec<_> = other.concepts.iter().collect();
        ours.sort_by(|a, b| a.id.cmp(&b.id));
        theirs.sort_by(|a, b| a.id.cmp(&b.id));
        ours == theirs
    }
}

/// A world-crafting session.
pub struct GameSession {
    profile: WorldProfile,
    store: DiscoveryStore,
    pipeline: GenerationPipeline,
    persistence: PersistenceAdapter,
    chronicle: Chronicle,
    visual: Mutex<Option<WorldVisual>>,
}

impl GameSession {
    /// Start a brand new world holding only the primitives.
    pub fn new(
        profile: WorldProfile,
        pipeline: GenerationPipeline,
        persistence: PersistenceAdapter,
    ) -> Self {
        let session = Self::with_store(profile, DiscoveryStore::new(), pipeline, persistence);
        session.chronicle.record(format!(
            "{} began shaping {}.",
            session.profile.actor_name, session.profile.world_name
        ));
        session.save();
        session
    }

    /// Continue the saved world if there is a readable one, otherwise start
    /// a new world from `profile`.
    pub async fn resume(
        profile: WorldProfile,
        pipeline: GenerationPipeline,
        persistence: PersistenceAdapter,
    ) -> Self {
        match persistence.load().await {
            Some(saved) => {
                let store = DiscoveryStore::from_concepts(saved.concepts);
                let session = Self::with_store(saved.profile, store, pipeline, persistence);
                session.chronicle.record(format!(
                    "{} returned to {}.",
                    session.profile.actor_name, session.profile.world_name
                ));
                session
            }
            None => Self::new(profile, pipeline, persistence),
        }
    }

    /// Build a session from configuration: Workers AI generation and file saves.
    ///
    /// Resumes the saved world when one exists.
    pub async fn from_config(config: &EngineConfig, profile: WorldProfile) -> Self {
        let provider = Arc::new(WorkersAiProvider::from_config(config));
        let pipeline = GenerationPipeline::new(provider)
            .with_presentation_delay(config.presentation_delay);
        let persistence = PersistenceAdapter::new(Arc::new(FileStorage::new(&config.save_dir)));
        Self::resume(profile, pipeline, persistence).await
    }

    fn with_store(
        profile: WorldProfile,
        store: DiscoveryStore,
        pipeline: GenerationPipeline,
        persistence: PersistenceAdapter,
    ) -> Self {
        Self {
            profile,
            store,
            pipeline,
            persistence,
            chronicle: Chronicle::new(),
            visual: Mutex::new(None),
        }
    }

    /// Combine two concepts by id.
    ///
    /// Fails only when another combination is still running or an id is
    /// unknown. Generation problems never surface here; they end in a
    /// generic concept and a chronicle note.
    pub async fn combine(&self, a: &str, b: &str) -> Result<CombineResult, SessionError> {
        let result = self
            .store
            .combine(a, b, &self.pipeline, &self.profile)
            .await?;

        let name_of = |id: &str| {
            self.store
                .get(id)
                .map(|c| c.name)
                .unwrap_or_else(|| id.to_string())
        };
        let (source, target) = (name_of(a), name_of(b));

        match &result {
            CombineResult::AlreadyKnown { .. } => {
                self.chronicle.record(format!(
                    "The combination of {source} and {target} is already known."
                ));
            }
            CombineResult::Created {
                concept,
                provenance,
            } => {
                self.record_attempt(&source, &target, provenance);
                self.chronicle.record(format!(
                    "Created {}! The visual appearance of {} is shifting...",
                    concept.name, self.profile.world_name
                ));
                tracing::info!(id = %concept.id, name = %concept.name, "concept discovered");
                self.save();
            }
            CombineResult::DuplicateName {
                candidate,
                existing,
                provenance,
            } => {
                self.record_attempt(&source, &target, provenance);
                self.chronicle.record(format!(
                    "{source} and {target} formed {}, but {} already exists. Nothing new emerged.",
                    candidate.name, existing.name
                ));
            }
        }

        Ok(result)
    }

    fn record_attempt(&self, source: &str, target: &str, provenance: &Provenance) {
        self.chronicle.record(format!(
            "{} combined {source} and {target}...",
            self.profile.actor_name
        ));
        if let Provenance::Fallback(err) = provenance {
            self.chronicle
                .record(format!("The creation failed ({err}). Using backup magic..."));
        }
    }

    /// Destroy the world: back to the primitives, saved record deleted.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.store.reset()?;
        self.persistence.clear().await?;
        *self.lock_visual() = None;
        self.chronicle.record(format!(
            "{} unmade {}. Only the four elements remain.",
            self.profile.actor_name, self.profile.world_name
        ));
        Ok(())
    }

    /// Redraw the world from its current concepts.
    pub async fn regenerate_visual(&self) -> WorldVisual {
        let concepts = self.store.snapshot();
        let visual = visual::regenerate(
            self.pipeline.provider().as_ref(),
            &self.profile.world_name,
            &concepts,
        )
        .await;
        *self.lock_visual() = Some(visual.clone());
        visual
    }

    /// The last visual produced, if any.
    pub fn visual(&self) -> Option<WorldVisual> {
        self.lock_visual().clone()
    }

    fn lock_visual(&self) -> std::sync::MutexGuard<'_, Option<WorldVisual>> {
        self.visual
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist the current world in the background.
    fn save(&self) {
        // The handle is dropped on purpose: saving never blocks play.
        let _ = self.persistence.save_with(|| self.snapshot());
    }

    /// Wait for background saves to settle.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// The world as a plain value.
    pub fn snapshot(&self) -> WorldSession {
        WorldSession {
            profile: self.profile.clone(),
            concepts: self.store.snapshot(),
        }
    }

    pub fn profile(&self) -> &WorldProfile {
        &self.profile
    }

    pub fn store(&self) -> &DiscoveryStore {
        &self.store
    }

    pub fn chronicle(&self) -> &Chronicle {
        &self.chronicle
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    /// All concepts in discovery order.
    pub fn concepts(&self) -> Vec<Concept> {
        self.store.snapshot()
    }

    /// Whether a combination is currently running.
    pub fn is_generating(&self) -> bool {
        self.store.is_busy()
    }
}
