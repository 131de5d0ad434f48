//! Exercises `list_remote_files` against a fake `rsync` binary rather than a
//! live rsync daemon, following the donor's pattern of testing subprocess
//! components by observable effect.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use scraper_core::config::{
    DEFAULT_DATA_BUFFER_THRESHOLD, DEFAULT_DATA_WAIT_TIME_SECS, DEFAULT_MAX_SLEEP_SECS,
    DEFAULT_MAX_UNCOMPRESSED_SIZE, DEFAULT_METRICS_ADDR,
};
use scraper_core::ScraperConfig;

fn write_fake_binary(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(script.as_bytes()).unwrap();
    let mut perms = f.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    f.set_permissions(perms).unwrap();
    path
}

fn test_config(rsync_binary: PathBuf, data_dir: PathBuf) -> ScraperConfig {
    ScraperConfig {
        rsync_host: "mlab1.lga0t.measurement-lab.org".into(),
        rsync_module: "ndt".into(),
        rsync_port: 7999,
        rsync_binary,
        tar_binary: PathBuf::from("/bin/true"),
        data_dir,
        bucket: "test-bucket".into(),
        datastore_namespace: "scraper".into(),
        expected_wait_time_secs: 1800.0,
        max_sleep_secs: DEFAULT_MAX_SLEEP_SECS,
        max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
        data_wait_time_secs: DEFAULT_DATA_WAIT_TIME_SECS,
        data_buffer_threshold: DEFAULT_DATA_BUFFER_THRESHOLD,
        metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
    }
}

#[tokio::test]
async fn listing_parses_data_lines_and_skips_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let fake_rsync = write_fake_binary(
        tmp.path(),
        "rsync",
        "#!/bin/sh\n\
         echo '2026/07/31/file1.tgz 2026/07/31-12:00:00'\n\
         echo '2026/07/31/file2.tgz is uptodate'\n\
         echo 'receiving incremental file list'\n\
         exit 0\n",
    );
    let config = test_config(fake_rsync, tmp.path().to_path_buf());

    let files = scraper_rsync::list_remote_files(&config).await.unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "2026/07/31/file1.tgz");
    assert_eq!(files[0].mtime, 1785499200);
}

#[tokio::test]
async fn listing_exit_code_24_is_treated_as_success() {
    let tmp = tempfile::tempdir().unwrap();
    let fake_rsync = write_fake_binary(
        tmp.path(),
        "rsync",
        "#!/bin/sh\nexit 24\n",
    );
    let config = test_config(fake_rsync, tmp.path().to_path_buf());

    let files = scraper_rsync::list_remote_files(&config).await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn listing_other_exit_codes_surface_as_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let fake_rsync = write_fake_binary(
        tmp.path(),
        "rsync",
        "#!/bin/sh\necho 'connection refused' 1>&2\nexit 5\n",
    );
    let config = test_config(fake_rsync, tmp.path().to_path_buf());

    let result = scraper_rsync::list_remote_files(&config).await;
    assert!(result.is_err());
}
