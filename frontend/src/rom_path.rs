//! ROM path resolution: reads a ROM image from a loose file or from inside a
//! ZIP archive.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Extensions recognised as ROM images inside an archive, in preference
/// order.
const ROM_EXTENSIONS: &[&str] = &["gba", "gbc", "gb", "bin", "rom"];

#[derive(Debug, Error)]
pub enum RomPathError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ZIP {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("no ROM image found in {0}")]
    EmptyArchive(PathBuf),
}

/// Read ROM bytes from `path`.
///
/// Resolution order:
/// 1. If `path` ends with `.zip` → the first entry with a known ROM
///    extension, or else the first file in the archive.
/// 2. Otherwise → the file itself.
pub fn load_rom(path: &Path) -> Result<Vec<u8>, RomPathError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return load_from_zip(path);
    }

    std::fs::read(path).map_err(|source| RomPathError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_from_zip(path: &Path) -> Result<Vec<u8>, RomPathError> {
    let io_err = |source| RomPathError::Io {
        path: path.to_path_buf(),
        source,
    };
    let zip_err = |source| RomPathError::Zip {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

    let mut fallback = None;
    let mut best: Option<(usize, usize)> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(zip_err)?;
        // Skip directories
        if entry.is_dir() {
            continue;
        }
        fallback.get_or_insert(i);

        let rank = Path::new(entry.name())
            .extension()
            .and_then(|ext| {
                ROM_EXTENSIONS
                    .iter()
                    .position(|known| ext.eq_ignore_ascii_case(known))
            });
        if let Some(rank) = rank
            && best.is_none_or(|(best_rank, _)| rank < best_rank)
        {
            best = Some((rank, i));
        }
    }

    let index = best
        .map(|(_, i)| i)
        .or(fallback)
        .ok_or_else(|| RomPathError::EmptyArchive(path.to_path_buf()))?;

    let mut entry = archive.by_index(index).map_err(zip_err)?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data).map_err(io_err)?;
    Ok(data)
}
