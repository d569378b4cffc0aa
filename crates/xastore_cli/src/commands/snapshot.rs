//! Loading and saving the engine's snapshot file.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};
use xastore_core::Engine;

/// Loads the engine stored at `path`.
///
/// A missing file yields an empty engine.
pub fn load(path: &Path) -> Result<Engine, Box<dyn std::error::Error>> {
    let mut engine = Engine::new();
    if !path.exists() {
        debug!(path = %path.display(), "snapshot missing, starting empty");
        return Ok(engine);
    }

    let data = fs::read(path)?;
    let stats = engine.restore(&data)?;
    debug!(
        path = %path.display(),
        records = stats.records_restored,
        entries = stats.entries_restored,
        "snapshot loaded"
    );
    Ok(engine)
}

/// Writes a backup of `engine` to `path`.
///
/// The backup goes to a temporary file in the same directory first and is
/// renamed over `path`, so a failed write leaves the old snapshot in place.
pub fn save(path: &Path, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let data = engine.backup()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&data)?;
    file.as_file().sync_all()?;
    file.persist(path)?;

    info!(path = %path.display(), bytes = data.len(), "snapshot saved");
    Ok(())
}
