//! Cartridge model: ROM image, battery-backed save memory and save-state
//! slots.
//!
//! Slot descriptors are rebuilt from the filesystem on every query so they
//! always reflect files written by the engine since the pak was created.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::GamePakError;

/// Largest ROM image accepted (16 MiB).
pub const MAX_ROM_SIZE: usize = 16 * 1024 * 1024;

/// Size of the battery-backed save memory blob.
pub const SAVE_MEMORY_SIZE: usize = 8 * 1024;

const SAVE_STATE_DIR: &str = "save_states";

/// Identifies a save-state slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    /// Written by auto-save.
    Auto,
    Index(u32),
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Index(n) => write!(f, "{n}"),
        }
    }
}

/// Snapshot of one save-state slot on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    pub id: SlotId,
    pub path: PathBuf,
    pub exists: bool,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct GamePak {
    rom: Vec<u8>,
    save_path: PathBuf,
    data_dir: PathBuf,
    slot_count: u32,
}

impl GamePak {
    /// Validate `rom` and build a pak.
    ///
    /// `save_path` is where save memory lives; `data_dir` holds the
    /// `save_states/` directory.
    pub fn new(
        rom: Vec<u8>,
        save_path: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        slot_count: u32,
    ) -> Result<Self, GamePakError> {
        validate_rom_size(rom.len())?;
        Ok(Self {
            rom,
            save_path: save_path.into(),
            data_dir: data_dir.into(),
            slot_count,
        })
    }

    /// Read a ROM file and derive save paths from it.
    ///
    /// Save memory sits beside the ROM as `<stem>.sav`. The data directory is
    /// `<data_root>/<stem>` when a root is given, otherwise `<stem>.data`
    /// beside the ROM.
    pub fn from_file(
        rom_path: &Path,
        data_root: Option<&Path>,
        slot_count: u32,
    ) -> Result<Self, GamePakError> {
        let rom = std::fs::read(rom_path).map_err(|source| GamePakError::Io {
            path: rom_path.to_path_buf(),
            source,
        })?;
        Self::with_derived_paths(rom, rom_path, data_root, slot_count)
    }

    /// Like [`from_file`](Self::from_file) for ROM bytes that were already
    /// extracted (e.g. from an archive) but still belong to `rom_path`.
    pub fn with_derived_paths(
        rom: Vec<u8>,
        rom_path: &Path,
        data_root: Option<&Path>,
        slot_count: u32,
    ) -> Result<Self, GamePakError> {
        let stem = rom_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let save_path = rom_path.with_extension("sav");
        let data_dir = match data_root {
            Some(root) => root.join(&stem),
            None => rom_path.with_extension("data"),
        };
        Self::new(rom, save_path, data_dir, slot_count)
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read save memory from disk, or a zeroed buffer if none exists yet.
    pub fn load_save_memory(&self) -> Result<Vec<u8>, GamePakError> {
        match std::fs::read(&self.save_path) {
            Ok(mut data) => {
                data.resize(SAVE_MEMORY_SIZE, 0);
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![0; SAVE_MEMORY_SIZE]),
            Err(source) => Err(GamePakError::Io {
                path: self.save_path.clone(),
                source,
            }),
        }
    }

    pub fn store_save_memory(&self, data: &[u8]) -> Result<(), GamePakError> {
        let io_err = |source| GamePakError::Io {
            path: self.save_path.clone(),
            source,
        };
        if let Some(parent) = self.save_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.save_path, data).map_err(io_err)
    }

    pub fn save_state_dir(&self) -> PathBuf {
        self.data_dir.join(SAVE_STATE_DIR)
    }

    pub fn slot_path(&self, id: SlotId) -> PathBuf {
        self.save_state_dir().join(format!("{id}.sav"))
    }

    /// Describe a slot as it is on disk right now.
    pub fn slot(&self, id: SlotId) -> SaveSlot {
        let path = self.slot_path(id);
        let metadata = std::fs::metadata(&path).ok();
        SaveSlot {
            id,
            exists: metadata.is_some(),
            modified: metadata.and_then(|m| m.modified().ok()),
            path,
        }
    }

    pub fn auto_slot(&self) -> SaveSlot {
        self.slot(SlotId::Auto)
    }

    /// The auto slot followed by every numbered slot.
    pub fn slots(&self) -> Vec<SaveSlot> {
        std::iter::once(SlotId::Auto)
            .chain((0..self.slot_count).map(SlotId::Index))
            .map(|id| self.slot(id))
            .collect()
    }
}

fn validate_rom_size(size: usize) -> Result<(), GamePakError> {
    if size == 0 {
        return Err(GamePakError::Empty);
    }
    if size > MAX_ROM_SIZE {
        return Err(GamePakError::TooLarge { size });
    }
    if !size.is_power_of_two() {
        return Err(GamePakError::NotPowerOfTwo { size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pak_in(dir: &Path, rom_size: usize) -> GamePak {
        GamePak::new(vec![0xAA; rom_size], dir.join("game.sav"), dir.join("game"), 2).unwrap()
    }

    #[test]
    fn accepts_power_of_two_sizes() {
        let dir = tempfile::tempdir().unwrap();
        for size in [1, 1024, 1 << 20, MAX_ROM_SIZE] {
            assert!(GamePak::new(vec![0; size], dir.path().join("s"), dir.path(), 0).is_ok());
        }
    }

    #[test]
    fn rejects_each_rule_with_its_own_error() {
        assert!(matches!(
            GamePak::new(Vec::new(), "s", "d", 0),
            Err(GamePakError::Empty)
        ));
        assert!(matches!(
            GamePak::new(vec![0; 3000], "s", "d", 0),
            Err(GamePakError::NotPowerOfTwo { size: 3000 })
        ));
        assert!(matches!(
            GamePak::new(vec![0; MAX_ROM_SIZE * 2], "s", "d", 0),
            Err(GamePakError::TooLarge { .. })
        ));
    }

    #[test]
    fn missing_save_file_gives_zeroed_memory() {
        let dir = tempfile::tempdir().unwrap();
        let pak = pak_in(dir.path(), 1024);
        let memory = pak.load_save_memory().unwrap();
        assert_eq!(memory.len(), SAVE_MEMORY_SIZE);
        assert!(memory.iter().all(|&b| b == 0));
    }

    #[test]
    fn save_memory_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let pak = pak_in(dir.path(), 1024);
        let mut data = vec![0u8; SAVE_MEMORY_SIZE];
        data[0] = 0x42;
        data[SAVE_MEMORY_SIZE - 1] = 0x99;
        pak.store_save_memory(&data).unwrap();
        assert_eq!(pak.load_save_memory().unwrap(), data);
    }

    #[test]
    fn slot_paths_follow_layout() {
        let pak = GamePak::new(vec![0; 16], "/x/game.sav", "/x/game", 1).unwrap();
        assert_eq!(
            pak.slot_path(SlotId::Auto),
            PathBuf::from("/x/game/save_states/auto.sav")
        );
        assert_eq!(
            pak.slot_path(SlotId::Index(3)),
            PathBuf::from("/x/game/save_states/3.sav")
        );
    }

    #[test]
    fn slots_are_recomputed_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let pak = pak_in(dir.path(), 1024);
        let slots = pak.slots();
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|s| !s.exists));

        std::fs::create_dir_all(pak.save_state_dir()).unwrap();
        std::fs::write(pak.slot_path(SlotId::Index(1)), b"state").unwrap();

        let slot = pak.slot(SlotId::Index(1));
        assert!(slot.exists);
        assert!(slot.modified.is_some());
        assert!(!pak.auto_slot().exists);
    }

    #[test]
    fn derived_paths_sit_beside_rom() {
        let dir = tempfile::tempdir().unwrap();
        let rom_path = dir.path().join("quest.gba");
        std::fs::write(&rom_path, vec![0u8; 256]).unwrap();

        let pak = GamePak::from_file(&rom_path, None, 0).unwrap();
        assert_eq!(pak.save_path(), dir.path().join("quest.sav"));
        assert_eq!(pak.data_dir(), dir.path().join("quest.data"));

        let root = dir.path().join("data");
        let pak = GamePak::from_file(&rom_path, Some(&root), 0).unwrap();
        assert_eq!(pak.data_dir(), root.join("quest"));
    }
}
