//! Write-to-temp-then-rename helper shared by every `write_*` operation.

use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` atomically: write to a sibling temp file in the
/// same directory, flush, then rename over the destination. A rename within
/// one filesystem is atomic, so a crash mid-write never leaves a partially
/// written file at `path`. Creates `path`'s parent directories first.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_path = path.to_path_buf();
    let tmp_name = format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("harmonia-state")
    );
    tmp_path.set_file_name(tmp_name);

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_create_parents_and_are_readable_afterwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn overwriting_an_existing_file_replaces_its_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
