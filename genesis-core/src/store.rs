//! The discovery store.
//!
//! Owns every known concept and the derivation index from combination key
//! to the concept it produced. All combination requests go through
//! [`DiscoveryStore::combine`], which enforces:
//!
//! - a key maps to at most one concept (re-combining a pair is free),
//! - no two concepts share a lowercase name, generic placeholder names aside,
//! - only one combination is in flight at a time; others are rejected.

use crate::concept::{primitives, Candidate, Category, Concept};
use crate::generation::{GenerationPipeline, Provenance};
use crate::pair::{canonicalize, CombinationKey};
use crate::session::WorldProfile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombineError {
    #[error("another combination is already in progress")]
    Busy,

    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    #[error("concept id {id} already exists")]
    InvariantViolation { id: String },
}

/// Outcome of a combination request.
#[derive(Debug, Clone)]
pub enum CombineResult {
    /// The pair was combined before; nothing was generated.
    AlreadyKnown { key: CombinationKey, concept: Concept },

    /// A new concept was added under the pair's key.
    Created { concept: Concept, provenance: Provenance },

    /// The generated name already belongs to another concept; nothing was added.
    DuplicateName {
        candidate: Candidate,
        existing: Concept,
        provenance: Provenance,
    },
}

impl CombineResult {
    /// The new concept, if one was created.
    pub fn created(&self) -> Option<&Concept> {
        match self {
            CombineResult::Created { concept, .. } => Some(concept),
            _ => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CombineResult::Created { .. })
    }

    pub fn is_already_known(&self) -> bool {
        matches!(self, CombineResult::AlreadyKnown { .. })
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, CombineResult::DuplicateName { .. })
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Concepts in discovery order.
    concepts: Vec<Concept>,
    by_id: HashMap<String, usize>,
    /// Lowercase name to the id of the first concept carrying it.
    by_name: HashMap<String, String>,
    derivations: HashMap<CombinationKey, String>,
}

impl StoreInner {
    fn from_concepts(concepts: Vec<Concept>) -> Self {
        let mut inner = Self::default();
        for concept in concepts {
            if inner.by_id.contains_key(&concept.id) {
                tracing::warn!(id = %concept.id, "dropping concept with duplicate id");
                continue;
            }
            inner.push(concept);
        }
        inner
    }

    fn push(&mut self, concept: Concept) {
        if let Some(key) = CombinationKey::from_derived_id(&concept.id) {
            self.derivations.insert(key, concept.id.clone());
        }
        self.by_name
            .entry(concept.name_key())
            .or_insert_with(|| concept.id.clone());
        self.by_id.insert(concept.id.clone(), self.concepts.len());
        self.concepts.push(concept);
    }

    fn get(&self, id: &str) -> Option<&Concept> {
        self.by_id.get(id).map(|&i| &self.concepts[i])
    }

    fn derived(&self, key: &CombinationKey) -> Option<&Concept> {
        self.derivations
            .get(key)
            .and_then(|id| self.get(id))
            .or_else(|| self.get(key.as_str()))
    }

    fn commit(
        &mut self,
        key: CombinationKey,
        candidate: Candidate,
        provenance: Provenance,
    ) -> Result<CombineResult, CombineError> {
        if !candidate.is_generic() {
            let existing = self
                .by_name
                .get(&candidate.name.to_lowercase())
                .and_then(|id| self.get(id));
            if let Some(existing) = existing {
                return Ok(CombineResult::DuplicateName {
                    existing: existing.clone(),
                    candidate,
                    provenance,
                });
            }
        }

        if self.by_id.contains_key(key.as_str()) {
            tracing::error!(id = %key, "refusing to overwrite existing concept");
            debug_assert!(false, "concept id {key} already exists");
            return Err(CombineError::InvariantViolation {
                id: key.into_string(),
            });
        }

        let concept = Concept::from_candidate(key.as_str(), candidate);
        self.push(concept.clone());
        Ok(CombineResult::Created {
            concept,
            provenance,
        })
    }
}

/// Clears the in-flight flag when a combination ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Authoritative set of discovered concepts.
#[derive(Debug)]
pub struct DiscoveryStore {
    inner: Mutex<StoreInner>,
    in_flight: AtomicBool,
}

impl Default for DiscoveryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryStore {
    /// A fresh store holding the four primitives.
    pub fn new() -> Self {
        Self::from_concepts(primitives())
    }

    /// Rebuild a store from a saved concept list.
    ///
    /// The derivation index is recovered from the ids of derived concepts.
    /// Repeated ids keep their first occurrence.
    pub fn from_concepts(concepts: Vec<Concept>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::from_concepts(concepts)),
            in_flight: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Whether a combination is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Combine two known concepts.
    ///
    /// A pair whose key already produced a concept returns
    /// [`CombineResult::AlreadyKnown`] without consulting the pipeline.
    /// While a combination is awaiting generation, further calls fail with
    /// [`CombineError::Busy`]. The store is only touched after generation
    /// completes, in a single step.
    pub async fn combine(
        &self,
        a: &str,
        b: &str,
        pipeline: &GenerationPipeline,
        profile: &WorldProfile,
    ) -> Result<CombineResult, CombineError> {
        let _in_flight = self.begin().ok_or(CombineError::Busy)?;

        let (key, source, target) = {
            let inner = self.lock();
            let source = inner
                .get(a)
                .cloned()
                .ok_or_else(|| CombineError::UnknownConcept(a.to_string()))?;
            let target = inner
                .get(b)
                .cloned()
                .ok_or_else(|| CombineError::UnknownConcept(b.to_string()))?;
            let key = canonicalize(&source.id, &target.id);

            if let Some(concept) = inner.derived(&key) {
                tracing::debug!(%key, "combination already known");
                return Ok(CombineResult::AlreadyKnown {
                    concept: concept.clone(),
                    key,
                });
            }
            (key, source, target)
        };

        let generation = pipeline.generate(profile, &source, &target).await;

        let result = self
            .lock()
            .commit(key, generation.candidate, generation.provenance)?;
        match &result {
            CombineResult::Created { concept, .. } => {
                tracing::debug!(id = %concept.id, name = %concept.name, "concept created")
            }
            CombineResult::DuplicateName { existing, .. } => {
                tracing::debug!(existing = %existing.id, "generated name already taken")
            }
            CombineResult::AlreadyKnown { .. } => {}
        }
        Ok(result)
    }

    /// Restore the four primitives, discarding everything else.
    pub fn reset(&self) -> Result<(), CombineError> {
        let _in_flight = self.begin().ok_or(CombineError::Busy)?;
        *self.lock() = StoreInner::from_concepts(primitives());
        Ok(())
    }

    /// Copy of every concept in discovery order.
    pub fn snapshot(&self) -> Vec<Concept> {
        self.lock().concepts.clone()
    }

    pub fn get(&self, id: &str) -> Option<Concept> {
        self.lock().get(id).cloned()
    }

    /// Case-insensitive lookup by name.
    pub fn find_by_name(&self, name: &str) -> Option<Concept> {
        let inner = self.lock();
        inner
            .by_name
            .get(&name.to_lowercase())
            .and_then(|id| inner.get(id))
            .cloned()
    }

    /// The concept a pair produced, if it has been combined before.
    pub fn derived(&self, a: &str, b: &str) -> Option<Concept> {
        self.lock().derived(&canonicalize(a, b)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().concepts.is_empty()
    }

    /// Number of concepts produced by combination.
    pub fn derived_count(&self) -> usize {
        self.lock().derivations.len()
    }

    /// Concepts grouped into the five display buckets.
    pub fn by_category(&self) -> Vec<(Category, Vec<Concept>)> {
        let inner = self.lock();
        Category::BUCKETS
            .iter()
            .map(|&bucket| {
                let members = inner
                    .concepts
                    .iter()
                    .filter(|c| c.category.bucket() == bucket)
                    .cloned()
                    .collect();
                (bucket, members)
            })
            .collect()
    }
}
