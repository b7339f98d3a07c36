//! ZIP archives of batch parts.
//!
//! The archive of batch `<id>` is `<download_root>/<key>/parts-<id>.zip` and
//! holds every part as `parts-<id>/<file name>`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::batch::DownloadBatch;
use crate::error::CoreError;
use crate::types::DbId;

/// Folder name inside the archive, and the archive's file stem.
pub fn archive_name(batch_id: DbId) -> String {
    format!("parts-{batch_id}")
}

/// Archive path relative to the download root.
pub fn archive_file(batch: &DownloadBatch) -> String {
    format!("{}/{}.zip", batch.key, archive_name(batch.id))
}

/// Write `files` (source path, entry name) into a new archive at
/// `destination`, under `folder/`. Returns the archive size in bytes.
///
/// The archive is written next to its destination and renamed into place,
/// so a half-written file is never visible under the final name.
pub fn write_archive(
    destination: &Path,
    folder: &str,
    files: &[(PathBuf, String)],
) -> Result<u64, CoreError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| zip_error(destination, e))?;
    }

    let partial = destination.with_extension("zip.partial");
    let result = write_entries(&partial, folder, files);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(zip_error(destination, e));
    }

    std::fs::rename(&partial, destination).map_err(|e| zip_error(destination, e))?;
    let size = std::fs::metadata(destination)
        .map(|m| m.len())
        .map_err(|e| zip_error(destination, e))?;

    tracing::debug!(
        path = %destination.display(),
        entries = files.len(),
        size,
        "Archive written",
    );
    Ok(size)
}

fn zip_error(destination: &Path, e: impl std::fmt::Display) -> CoreError {
    CoreError::ZipBuild(format!("{}: {e}", destination.display()))
}

fn write_entries(
    path: &Path,
    folder: &str,
    files: &[(PathBuf, String)],
) -> zip::result::ZipResult<()> {
    let mut writer = ZipWriter::new(BufWriter::new(File::create(path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (source, name) in files {
        writer.start_file(format!("{folder}/{name}"), options)?;
        let mut reader = BufReader::new(File::open(source)?);
        io::copy(&mut reader, &mut writer)?;
    }

    writer.finish()?.flush()?;
    Ok(())
}

/// Entry names of an archive, in archive order.
pub fn entry_names(path: &Path) -> Result<Vec<String>, CoreError> {
    let file = File::open(path).map_err(|e| CoreError::ZipBuild(e.to_string()))?;
    let archive = ZipArchive::new(file).map_err(|e| CoreError::ZipBuild(e.to_string()))?;
    Ok(archive.file_names().map(str::to_string).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Read;

    #[test]
    fn writes_entries_under_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.prt");
        let b = tmp.path().join("b.prt.2");
        std::fs::write(&a, b"alpha").unwrap();
        std::fs::write(&b, b"bravo").unwrap();

        let dest = tmp.path().join("out/key123/parts-7.zip");
        let size = write_archive(
            &dest,
            &archive_name(7),
            &[(a, "a.prt".into()), (b, "b.prt.2".into())],
        )
        .unwrap();
        assert!(size > 0);
        assert!(!dest.with_extension("zip.partial").exists());

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut contents = String::new();
        archive
            .by_name("parts-7/b.prt.2")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "bravo");

        let mut names = entry_names(&dest).unwrap();
        names.sort();
        assert_eq!(names, ["parts-7/a.prt", "parts-7/b.prt.2"]);
    }

    #[test]
    fn missing_source_fails_without_leaving_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("k/parts-1.zip");
        let result = write_archive(
            &dest,
            "parts-1",
            &[(tmp.path().join("nope.prt"), "nope.prt".into())],
        );
        assert_matches!(result, Err(CoreError::ZipBuild(_)));
        assert!(!dest.exists());
        assert!(!dest.with_extension("zip.partial").exists());
    }
}
