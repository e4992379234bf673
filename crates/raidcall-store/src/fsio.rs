//! Small filesystem helpers shared by the stores.

use std::path::Path;

use raidcall_core::{RaidcallError, Result};

/// Write `bytes` to `path` so readers see either the old or the new content.
/// Writes a sibling temp file, flushes it, then renames over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = path.with_extension("tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        std::fs::remove_file(&tmp).ok();
        RaidcallError::Persistence(format!("Write {}: {e}", path.display()))
    })
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RaidcallError::Persistence(format!(
            "Remove {}: {e}",
            path.display()
        ))),
    }
}
