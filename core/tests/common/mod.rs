use std::path::Path;

use parallax_core::config::SessionConfig;
use parallax_core::gamepak::GamePak;

/// Config with a short tick so threaded tests finish quickly.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        tick_default_ms: 2,
        tick_max_ms: 10,
        ..SessionConfig::default()
    }
}

/// A valid 1 MiB pak whose save and state files live under `dir`.
pub fn pak_in(dir: &Path) -> GamePak {
    GamePak::new(
        vec![0xEA; 1024 * 1024],
        dir.join("game.sav"),
        dir.join("game"),
        4,
    )
    .unwrap()
}
