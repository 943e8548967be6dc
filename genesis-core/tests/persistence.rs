//! Save and resume behavior.

use genesis_core::persist::{SavedWorld, STORAGE_KEY};
use genesis_core::testing::{assert_concept_count, assert_has_concept, MockProvider, TestHarness};
use genesis_core::{
    EngineConfig, FileStorage, GameSession, MemoryStorage, PersistenceAdapter, WorldProfile,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_every_creation_is_saved() {
    let harness = TestHarness::new();
    harness.expect_concept("Steam", "♨️", "Hot vapor");
    harness.combine_names("Fire", "Water").await;
    harness.session.flush().await;

    let saved = harness.saved().expect("world should be saved");
    assert!(saved.equivalent(&harness.session.snapshot()));
    assert!(saved.concepts.iter().any(|c| c.name == "Steam"));
}

#[tokio::test]
async fn test_resume_continues_saved_world() {
    let original = TestHarness::new();
    original.expect_concept("Mist", "🌫", "Damp air");
    original.combine_names("Air", "Water").await;
    original.combine_names("Water", "Water").await;
    original.session.flush().await;

    let resumed = TestHarness::resume(original.storage.clone(), MockProvider::new()).await;

    assert_concept_count(&resumed, 6);
    assert_has_concept(&resumed, "Mist");
    assert!(resumed.session.snapshot().equivalent(&original.session.snapshot()));

    // Derivations survive the round trip, so no generation is needed.
    let again = resumed.session.combine("water", "air").await.unwrap();
    assert!(again.is_already_known());
    assert_eq!(resumed.provider.call_count(), 0);
    assert!(resumed.last_chronicle().unwrap().contains("already known"));
}

#[tokio::test]
async fn test_corrupt_save_starts_fresh() {
    let storage = Arc::new(MemoryStorage::new());
    storage.put_raw(STORAGE_KEY, "{\"actorName\": \"Cronos\", \"concepts\": [");

    let harness = TestHarness::resume(storage, MockProvider::new()).await;

    assert_concept_count(&harness, 4);
    assert_eq!(harness.session.profile().world_name, "Earth Prime");
    assert!(harness.last_chronicle().unwrap().contains("began shaping"));
}

#[tokio::test]
async fn test_record_from_before_versioning_loads() {
    let storage = Arc::new(MemoryStorage::new());
    storage.put_raw(
        STORAGE_KEY,
        r#"{
            "actorName": "Gaia",
            "worldName": "Terra",
            "trait": "Growth",
            "concepts": [
                {"id": "air", "name": "Air", "emoji": "💨", "description": "Gaseous substances", "category": "elements"},
                {"id": "earth-water", "name": "Mud", "emoji": "🟤", "description": "Wet dirt"}
            ]
        }"#,
    );

    let harness = TestHarness::resume(storage, MockProvider::new()).await;

    assert_eq!(harness.session.profile().actor_name, "Gaia");
    assert_concept_count(&harness, 2);
    assert!(harness.session.store().derived("water", "earth").is_some());
}

#[tokio::test]
async fn test_reset_deletes_record() {
    let harness = TestHarness::new();
    harness.combine_names("Fire", "Fire").await;
    harness.session.flush().await;
    assert!(harness.saved().is_some());

    harness.session.reset().await.unwrap();
    harness.session.flush().await;

    assert!(harness.storage.raw(STORAGE_KEY).is_none());
}

#[tokio::test]
async fn test_file_backed_session_resumes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = EngineConfig::new()
        .with_save_dir(temp_dir.path())
        .with_presentation_delay(Duration::ZERO);

    let first = GameSession::from_config(&config, WorldProfile::new("Cronos", "Time", "Chronos IV")).await;
    let result = first.combine("air", "fire").await.unwrap();
    assert_eq!(result.created().unwrap().name, "Essence of Air & Fire");
    first.flush().await;

    let record = FileStorage::new(temp_dir.path()).record_path(STORAGE_KEY);
    let content = std::fs::read_to_string(&record).expect("record should exist");
    let saved = SavedWorld::from_json(&content).unwrap();
    assert_eq!(saved.world_name, "Chronos IV");
    assert_eq!(saved.concepts.len(), 5);

    // A different profile is ignored while a saved world exists.
    let second = GameSession::from_config(&config, WorldProfile::new("Gaia", "Growth", "Terra")).await;
    assert_eq!(second.profile().actor_name, "Cronos");
    assert_eq!(second.concepts().len(), 5);
}

#[tokio::test]
async fn test_adapter_key_is_configurable() {
    let storage = Arc::new(MemoryStorage::new());
    let adapter = PersistenceAdapter::new(storage.clone()).with_key("slot_2");
    let session = TestHarness::new().session.snapshot();

    adapter.save_now(&session).await.unwrap();

    assert!(storage.raw("slot_2").is_some());
    assert!(storage.raw(STORAGE_KEY).is_none());
}
