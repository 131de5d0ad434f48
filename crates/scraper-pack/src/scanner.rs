use std::path::{Path, PathBuf};

use scraper_core::LocalFile;

/// Walks `root` recursively and returns every regular file whose mtime
/// satisfies `low < mtime <= high` (both whole-second Unix timestamps),
/// relative to `root`. Order is unspecified; callers that need time order
/// must sort the result themselves (the packer does).
pub fn scan_window(root: &Path, low: i64, high: i64) -> anyhow::Result<Vec<LocalFile>> {
    let mut out = Vec::new();
    if root.is_dir() {
        walk(root, root, low, high, &mut out)?;
    }
    Ok(out)
}

fn walk(
    root: &Path,
    dir: &Path,
    low: i64,
    high: i64,
    out: &mut Vec<LocalFile>,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;

        if meta.is_dir() {
            walk(root, &path, low, high, out)?;
        } else if meta.is_file() {
            let mtime = mtime_secs(&meta)?;
            if mtime > low && mtime <= high {
                if let Some(rel) = relative_path(root, &path) {
                    if let Some(file) = LocalFile::new(rel, mtime, meta.len()) {
                        out.push(file);
                    }
                }
            }
        }
    }
    Ok(())
}

fn mtime_secs(meta: &std::fs::Metadata) -> anyhow::Result<i64> {
    let modified = meta.modified()?;
    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    rel.to_str().map(|s| s.replace('\\', "/"))
}

/// Removes `dir` and any now-empty ancestor directories up to (but not
/// including) `stop_at`, matching the bottom-up pruning the original
/// archiver performed after deleting uploaded data files.
pub fn prune_empty_dirs(mut dir: PathBuf, stop_at: &Path) {
    while dir != stop_at && dir.starts_with(stop_at) {
        match std::fs::read_dir(&dir) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(_) => break,
        }
        if std::fs::remove_dir(&dir).is_err() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_window_filters_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let day_dir = dir.path().join("2026/07/31");
        fs::create_dir_all(&day_dir).unwrap();
        let file_path = day_dir.join("data.bin");
        fs::write(&file_path, b"hello").unwrap();

        let meta = fs::metadata(&file_path).unwrap();
        let mtime = mtime_secs(&meta).unwrap();

        let in_window = scan_window(dir.path(), mtime - 10, mtime + 10).unwrap();
        assert_eq!(in_window.len(), 1);

        let outside_window = scan_window(dir.path(), mtime + 1, mtime + 10).unwrap();
        assert!(outside_window.is_empty());
    }

    #[test]
    fn prune_removes_empty_ancestors_but_not_stop_at() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2026/07/31");
        fs::create_dir_all(&nested).unwrap();

        prune_empty_dirs(nested.clone(), dir.path());

        assert!(!nested.exists());
        assert!(dir.path().exists());
    }
}
