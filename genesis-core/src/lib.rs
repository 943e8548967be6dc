//! Combination and discovery engine for an AI-assisted world-crafting game.
//!
//! This crate provides:
//! - A discovery store where combining two concepts yields a third
//! - A three-tier generation pipeline (recipes, Workers AI, local fallback)
//! - Fire-and-forget persistence of the world under a single record
//! - A player-facing chronicle of everything that happened
//!
//! # Quick Start
//!
//! ```ignore
//! use genesis_core::{EngineConfig, GameSession, WorldProfile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let profile = WorldProfile::new("Cronos", "Time", "Earth Prime");
//!
//!     let session = GameSession::from_config(&config, profile).await;
//!     let result = session.combine("air", "water").await?;
//!     println!("{:?}", result.created());
//!
//!     session.flush().await;
//!     Ok(())
//! }
//! ```

pub mod chronicle;
pub mod concept;
pub mod config;
pub mod generation;
pub mod pair;
pub mod persist;
pub mod provider;
pub mod recipe;
pub mod session;
pub mod store;
pub mod testing;
pub mod visual;

// Primary public API
pub use chronicle::{Chronicle, ChronicleEntry};
pub use concept::{Candidate, Category, Concept};
pub use config::{ConfigError, EngineConfig};
pub use generation::{
    GenerationError, GenerationPipeline, GenerationPrompt, GenerationProvider, Provenance,
    ProviderError,
};
pub use pair::{canonicalize, CombinationKey};
pub use persist::{FileStorage, MemoryStorage, PersistError, PersistenceAdapter, SaveStorage};
pub use provider::WorkersAiProvider;
pub use recipe::RecipeTable;
pub use session::{GameSession, SessionError, WorldProfile, WorldSession};
pub use store::{CombineError, CombineResult, DiscoveryStore};
pub use testing::{MockProvider, TestHarness};
pub use visual::{WorldImage, WorldVisual};
