use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write via a temp file in the same directory, then rename over `path`.
/// Readers see either the old contents or the new, never a torn file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tasks.json");
        fs::write(&path, "old").unwrap();
        atomic_write(&path, b"[]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        // no stray temp files left behind
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
