mod common;

use std::sync::Arc;
use std::time::Duration;

use parallax_core::clock::{ClockState, EmulationClock};
use parallax_core::config::SessionConfig;
use parallax_core::engine::EngineHandle;
use parallax_core::gamepak::{SAVE_MEMORY_SIZE, SlotId};
use parallax_core::testing::FakeEngine;

use common::{fast_config, pak_in};

fn clock_with(engine: FakeEngine, config: &SessionConfig) -> (EmulationClock<FakeEngine>, Arc<EngineHandle<FakeEngine>>) {
    let handle = Arc::new(EngineHandle::new(engine));
    (EmulationClock::new(handle.clone(), config), handle)
}

// =================================================================
// Lifecycle
// =================================================================

#[test]
fn test_resume_without_pak_spawns_nothing() {
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());
    clock.resume().unwrap();
    assert_eq!(clock.state(), ClockState::Unloaded);
    assert!(!clock.is_running());

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(handle.engine().counters().ticks, 0);
}

#[test]
fn test_load_run_pause_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default().with_save_memory(0x5C);
    let (mut clock, handle) = clock_with(engine, &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    assert_eq!(clock.state(), ClockState::Loaded);
    assert_eq!(handle.engine().last_rom_len(), 1024 * 1024);
    assert_eq!(handle.engine().last_save_memory(), vec![0; SAVE_MEMORY_SIZE]);

    clock.resume().unwrap();
    assert_eq!(clock.state(), ClockState::Running);
    std::thread::sleep(Duration::from_millis(40));
    assert!(handle.engine().counters().ticks > 1);

    clock.pause().unwrap();
    assert_eq!(clock.state(), ClockState::Loaded);
    assert_eq!(handle.engine().counters().save_memory_reads, 1);

    let saved = std::fs::read(dir.path().join("game.sav")).unwrap();
    assert_eq!(saved.len(), SAVE_MEMORY_SIZE);
    assert!(saved.iter().all(|&b| b == 0x5C));
}

#[test]
fn test_pause_blocks_until_tick_thread_exits() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default().with_tick_delay(Duration::from_millis(40));
    let (mut clock, handle) = clock_with(engine, &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    std::thread::sleep(Duration::from_millis(10));

    clock.pause().unwrap();
    assert!(!handle.engine().is_ticking());

    let ticks = handle.engine().counters().ticks;
    assert!(ticks >= 1);
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(handle.engine().counters().ticks, ticks);
}

#[test]
fn test_double_resume_keeps_single_tick_thread() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default().with_tick_delay(Duration::from_millis(1));
    let (mut clock, handle) = clock_with(engine, &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    clock.resume().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    clock.pause().unwrap();

    assert_eq!(handle.engine().max_concurrent_ticks(), 1);
    assert_eq!(handle.engine().counters().save_memory_reads, 1);
}

#[test]
fn test_pause_while_idle_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.pause().unwrap();
    clock.load(pak_in(dir.path())).unwrap();
    clock.pause().unwrap();

    assert_eq!(handle.engine().counters().save_memory_reads, 0);
    assert!(!dir.path().join("game.sav").exists());
}

#[test]
fn test_load_replaces_running_pak() {
    let dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    clock.load(pak_in(other.path())).unwrap();

    assert_eq!(clock.state(), ClockState::Loaded);
    assert_eq!(handle.engine().counters().loads, 2);
    assert!(dir.path().join("game.sav").exists());
    assert_eq!(
        clock.gamepak().unwrap().save_path(),
        other.path().join("game.sav")
    );
}

#[test]
fn test_unload_returns_to_unloaded() {
    let dir = tempfile::tempdir().unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    clock.unload().unwrap();

    assert_eq!(clock.state(), ClockState::Unloaded);
    assert_eq!(handle.engine().counters().unloads, 1);
    clock.resume().unwrap();
    assert!(!clock.is_running());
}

#[test]
fn test_existing_save_memory_reaches_engine() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("game.sav"), [0x11, 0x22, 0x33]).unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();

    let memory = handle.engine().last_save_memory();
    assert_eq!(memory.len(), SAVE_MEMORY_SIZE);
    assert_eq!(&memory[..3], &[0x11, 0x22, 0x33]);
}

// =================================================================
// Pacing
// =================================================================

#[test]
fn test_tick_hints_stay_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &config);

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    clock.pause().unwrap();

    let hints = handle.engine().hints();
    assert!(!hints.is_empty());
    for hint in hints {
        assert!(hint >= config.tick_default());
        assert!(hint <= config.tick_max());
    }
}

#[test]
fn test_fast_ticks_are_paced_to_default_duration() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        tick_default_ms: 10,
        tick_max_ms: 20,
        ..SessionConfig::default()
    };
    let (mut clock, handle) = clock_with(FakeEngine::default(), &config);

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    clock.pause().unwrap();

    // An unpaced loop would have ticked thousands of times.
    let ticks = handle.engine().counters().ticks;
    assert!(ticks >= 2, "ticks = {ticks}");
    assert!(ticks <= 12, "ticks = {ticks}");
}

// =================================================================
// Save states
// =================================================================

#[test]
fn test_save_state_pauses_and_writes_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    assert!(clock.save_state(SlotId::Index(1)).unwrap());

    assert_eq!(clock.state(), ClockState::Loaded);
    let pak = clock.gamepak().unwrap();
    let slot = pak.slot(SlotId::Index(1));
    assert!(slot.exists);
    assert_eq!(slot.path, dir.path().join("game/save_states/1.sav"));

    assert!(clock.load_state(SlotId::Index(1)).unwrap());
    assert_eq!(handle.engine().counters().load_states, 1);
    let state_file = dir.path().join("game/save_states/1.sav");
    assert_eq!(handle.engine().state_paths(), vec![state_file.clone(), state_file]);
}

#[test]
fn test_load_missing_state_propagates_engine_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut clock, _handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    assert!(clock.load_state(SlotId::Index(3)).is_err());
}

#[test]
fn test_state_calls_without_pak_are_noops() {
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());
    assert!(!clock.save_state(SlotId::Index(0)).unwrap());
    assert!(!clock.load_state(SlotId::Auto).unwrap());
    clock.reset().unwrap();
    assert!(!clock.perform_auto_save().unwrap());

    let counters = handle.engine().counters();
    assert_eq!(counters.save_states, 0);
    assert_eq!(counters.resets, 0);
}

#[test]
fn test_auto_save_follows_config() {
    let dir = tempfile::tempdir().unwrap();
    let disabled = SessionConfig {
        auto_save: false,
        ..fast_config()
    };
    let (mut clock, _) = clock_with(FakeEngine::default(), &disabled);
    clock.load(pak_in(dir.path())).unwrap();
    assert!(!clock.perform_auto_save().unwrap());
    assert!(!clock.gamepak().unwrap().auto_slot().exists);

    let (mut clock, _) = clock_with(FakeEngine::default(), &fast_config());
    clock.load(pak_in(dir.path())).unwrap();
    assert!(clock.perform_auto_save().unwrap());
    assert!(clock.gamepak().unwrap().auto_slot().exists);
}

#[test]
fn test_reset_pauses_then_resets() {
    let dir = tempfile::tempdir().unwrap();
    let (mut clock, handle) = clock_with(FakeEngine::default(), &fast_config());

    clock.load(pak_in(dir.path())).unwrap();
    clock.resume().unwrap();
    clock.reset().unwrap();

    assert_eq!(clock.state(), ClockState::Loaded);
    assert_eq!(handle.engine().counters().resets, 1);
    assert_eq!(handle.engine().counters().save_memory_reads, 1);
}
