use std::io::Cursor;
use std::path::Path;

use crate::core::error::{ModSyncError, ModSyncResult};

/// Unpack a zip archive held in memory into `dest`, keeping the archive's
/// own directory structure. Entries that would land outside `dest` are
/// rejected. Returns the number of files written.
pub fn extract_zip_bytes(archive_bytes: &[u8], dest: &Path) -> ModSyncResult<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))?;

    std::fs::create_dir_all(dest).map_err(|source| ModSyncError::io(dest, source))?;

    let mut files = 0;
    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;

        let rel_path = zipped
            .enclosed_name()
            .ok_or_else(|| ModSyncError::UnsafeArchiveEntry(zipped.name().to_string()))?;
        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel_path);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|source| ModSyncError::io(&out_path, source))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ModSyncError::io(parent, source))?;
        }

        let mut out =
            std::fs::File::create(&out_path).map_err(|source| ModSyncError::io(&out_path, source))?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| ModSyncError::io(&out_path, source))?;
        files += 1;
    }

    if files == 0 {
        return Err(ModSyncError::EmptyArchive);
    }

    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip from `(path, contents)` pairs.
    pub(crate) fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[
            ("manifest.json", "{}"),
            ("plugins/PlantEverything.dll", "binary"),
            ("config/Advize.PlantEverything.cfg", "[General]"),
        ]);

        let count = extract_zip_bytes(&bytes, dir.path()).unwrap();
        assert_eq!(count, 3);
        assert!(dir.path().join("manifest.json").is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plugins/PlantEverything.dll")).unwrap(),
            "binary"
        );
    }

    #[test]
    fn rejects_entries_escaping_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let bytes = zip_of(&[("../evil.txt", "nope")]);

        let err = extract_zip_bytes(&bytes, &dest).unwrap_err();
        assert!(matches!(err, ModSyncError::UnsafeArchiveEntry(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn garbage_is_a_zip_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_zip_bytes(b"not a zip at all", dir.path()).unwrap_err();
        assert!(matches!(err, ModSyncError::Zip(_)));
    }

    #[test]
    fn archive_without_files_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[]);
        let err = extract_zip_bytes(&bytes, dir.path()).unwrap_err();
        assert!(matches!(err, ModSyncError::EmptyArchive));
    }
}
