use std::io::Write as _;
use std::path::{Path, PathBuf};

use scraper_core::{Archive, EndpointIdentity, LocalFile, ScraperError, ScraperResult};

/// Groups a set of local files into size-bounded batches, sorted ascending
/// by mtime, honoring the rule that files sharing the same whole-second
/// mtime are never split across batches even if doing so overshoots
/// `max_uncompressed_size`. The archive filename is derived from the
/// minimum mtime in a batch down to whole seconds, so splitting a shared
/// second across two archives would collide on the same name.
pub fn group_into_batches(mut files: Vec<LocalFile>, max_uncompressed_size: u64) -> Vec<Vec<LocalFile>> {
    files.sort_by_key(|f| f.mtime);

    let mut batches = Vec::new();
    let mut current: Vec<LocalFile> = Vec::new();
    let mut current_size: u64 = 0;
    let mut prev_mtime: Option<i64> = None;

    for file in files {
        let seals_current = !current.is_empty()
            && current_size + file.size > max_uncompressed_size
            && prev_mtime != Some(file.mtime);

        if seals_current {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }

        current_size += file.size;
        prev_mtime = Some(file.mtime);
        current.push(file);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// A sealed archive on disk, not yet uploaded. The caller must delete
/// `path` (and the source data files) only after the upload has been
/// acknowledged; `seal_batch` itself never deletes source files.
pub struct SealedArchive {
    pub archive: Archive,
    pub path: PathBuf,
    pub files: Vec<LocalFile>,
}

/// Seals one batch into a `tar cfz` archive under `data_dir`, naming it from
/// the batch's minimum mtime. If an archive of that name already exists
/// (e.g. left over from an interrupted previous cycle) it is removed first.
pub async fn seal_batch(
    tar_binary: &Path,
    data_dir: &Path,
    endpoint: &EndpointIdentity,
    batch: Vec<LocalFile>,
) -> ScraperResult<SealedArchive> {
    let min_mtime = batch
        .iter()
        .map(|f| f.mtime)
        .min()
        .expect("batch is non-empty");
    let max_mtime = batch.iter().map(|f| f.mtime).max().unwrap();
    let filename = Archive::filename_for(endpoint, min_mtime);
    let archive_path = data_dir.join(&filename);

    if archive_path.exists() {
        tracing::warn!(path = %archive_path.display(), "removing stale archive before repacking");
        std::fs::remove_file(&archive_path)
            .map_err(|e| ScraperError::TarError(format!("removing stale archive: {e}")))?;
    }

    let mut list_file = tempfile::NamedTempFile::new()
        .map_err(|e| ScraperError::TarError(format!("creating file list: {e}")))?;
    for file in &batch {
        list_file
            .write_all(file.path.as_bytes())
            .map_err(|e| ScraperError::TarError(format!("writing file list: {e}")))?;
        list_file
            .write_all(b"\0")
            .map_err(|e| ScraperError::TarError(format!("writing file list: {e}")))?;
    }
    list_file
        .flush()
        .map_err(|e| ScraperError::TarError(format!("flushing file list: {e}")))?;

    let output = tokio::process::Command::new(tar_binary)
        .arg("cfz")
        .arg(&archive_path)
        .arg("--null")
        .arg("--files-from")
        .arg(list_file.path())
        .arg("-C")
        .arg(data_dir)
        .output()
        .await
        .map_err(|e| ScraperError::TarError(format!("spawning tar: {e}")))?;

    if !output.status.success() {
        return Err(ScraperError::TarError(format!(
            "tar exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    if !archive_path.exists() {
        return Err(ScraperError::NoTarFile(filename));
    }

    let archive = Archive {
        filename,
        min_mtime,
        max_mtime,
        file_count: batch.len(),
    };

    Ok(SealedArchive {
        archive,
        path: archive_path,
        files: batch,
    })
}

/// Deletes the source data files of a sealed (and by now uploaded) archive,
/// along with the archive file itself, then prunes any day directories left
/// empty by the deletion. Must only be called after the upload has been
/// acknowledged.
pub fn cleanup_after_upload(data_dir: &Path, sealed: &SealedArchive) -> ScraperResult<()> {
    for file in &sealed.files {
        let full_path = data_dir.join(&file.path);
        if let Err(e) = std::fs::remove_file(&full_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(ScraperError::Io(e));
            }
        }
        if let Some(day_dir) = full_path.parent() {
            crate::scanner::prune_empty_dirs(day_dir.to_path_buf(), data_dir);
        }
    }
    std::fs::remove_file(&sealed.path).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, mtime: i64, size: u64) -> LocalFile {
        LocalFile::new(path, mtime, size).unwrap()
    }

    #[test]
    fn groups_respect_size_bound() {
        let files = vec![
            file("2026/07/31/a", 100, 1000),
            file("2026/07/31/b", 101, 1000),
        ];
        let batches = group_into_batches(files, 1500);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn same_second_never_split_even_over_budget() {
        let files = vec![
            file("2026/07/31/a", 100, 1200),
            file("2026/07/31/b", 100, 1200),
            file("2026/07/31/c", 101, 1000),
            file("2026/07/31/d", 102, 1200),
            file("2026/07/31/e", 102, 1200),
        ];
        let batches = group_into_batches(files, 2048);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].mtime, 100);
        assert_eq!(batches[0][1].mtime, 100);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].mtime, 101);
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[2][0].mtime, 102);
        assert_eq!(batches[2][1].mtime, 102);
    }

    #[test]
    fn single_file_within_budget_is_one_batch() {
        let files = vec![file("2026/07/31/a", 100, 10)];
        let batches = group_into_batches(files, 1_000_000);
        assert_eq!(batches.len(), 1);
    }
}
