mod common;

use std::sync::Arc;
use std::time::Duration;

use parallax_core::clock::ClockState;
use parallax_core::gamepak::SlotId;
use parallax_core::input::{Button, InputState};
use parallax_core::session::Session;
use parallax_core::testing::{CountingAudio, FakeEngine};

use common::{fast_config, pak_in};

#[test]
fn test_audio_follows_run_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(FakeEngine::default(), fast_config());

    session.resume().unwrap();
    assert!(!session.audio().is_playing());

    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();
    session.resume().unwrap();
    assert!(session.audio().is_playing());

    session.pause().unwrap();
    assert!(!session.audio().is_playing());

    let counters = session.engine().engine().counters();
    assert_eq!(counters.audio_starts, 1);
    assert_eq!(counters.audio_stops, 1);
}

#[test]
fn test_host_audio_output_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let output = Arc::new(CountingAudio::default());
    let mut session = Session::with_audio_output(FakeEngine::default(), output.clone(), fast_config());

    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();
    session.save_state(SlotId::Index(0)).unwrap();

    assert_eq!(output.starts(), 1);
    assert_eq!(output.stops(), 1);
    assert_eq!(session.engine().engine().counters().audio_starts, 0);
}

#[test]
fn test_input_reaches_engine_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(FakeEngine::default(), fast_config());
    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();

    session.input().press(Button::A);
    session.input().press(Button::Right);
    session.input().release(Button::A);
    std::thread::sleep(Duration::from_millis(5));

    let engine = session.engine().engine();
    assert_eq!(engine.counters().input_updates, 3);
    assert_eq!(
        engine.last_input(),
        Some(InputState::default().with(Button::Right))
    );
}

#[test]
fn test_shutdown_destroys_engine_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(FakeEngine::default(), fast_config());
    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();

    session.shutdown().unwrap();
    session.shutdown().unwrap();

    assert_eq!(session.state(), ClockState::Unloaded);
    let engine = Arc::clone(session.engine());
    drop(session);

    let counters = engine.engine().counters();
    assert_eq!(counters.destroy, 1);
    assert_eq!(counters.unloads, 1);
    assert_eq!(counters.save_memory_reads, 1);
}

#[test]
fn test_drop_tears_down_running_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(FakeEngine::default(), fast_config());
    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();
    let engine = Arc::clone(session.engine());

    drop(session);

    assert!(engine.is_destroyed());
    assert!(!engine.engine().is_ticking());
    assert_eq!(engine.engine().counters().destroy, 1);
    assert!(dir.path().join("game.sav").exists());
}

#[test]
fn test_calls_after_shutdown_are_guarded() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(FakeEngine::default(), fast_config());
    session.shutdown().unwrap();

    session.input().press(Button::Start);
    session.load(pak_in(dir.path())).unwrap();
    session.resume().unwrap();
    std::thread::sleep(Duration::from_millis(10));
    session.pause().unwrap();

    let counters = session.engine().engine().counters();
    assert_eq!(counters.input_updates, 0);
    assert_eq!(counters.loads, 0);
    assert_eq!(counters.ticks, 0);
}

#[test]
fn test_save_file_survives_use_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let save = dir.path().join("game.sav");
    std::fs::write(&save, vec![0x77; 8 * 1024]).unwrap();

    let mut session = Session::new(FakeEngine::default(), fast_config());
    session.shutdown().unwrap();

    session.load(pak_in(dir.path())).unwrap();
    assert_eq!(session.state(), ClockState::Unloaded);
    session.resume().unwrap();
    assert_eq!(session.state(), ClockState::Unloaded);
    assert!(!session.audio().is_playing());
    session.pause().unwrap();
    assert!(!session.save_state(SlotId::Auto).unwrap());

    assert_eq!(std::fs::read(&save).unwrap(), vec![0x77; 8 * 1024]);
    assert!(!dir.path().join("game").join("save_states").exists());
}
