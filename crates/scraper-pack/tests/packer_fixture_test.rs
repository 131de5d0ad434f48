//! Exercises `seal_batch` against a fake `tar` binary rather than a real
//! tar, following the donor's pattern of testing subprocess components by
//! observable effect (the archive file that does or doesn't appear).

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use scraper_core::{EndpointIdentity, LocalFile};

fn write_fake_binary(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(script.as_bytes()).unwrap();
    let mut perms = f.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    f.set_permissions(perms).unwrap();
    path
}

fn endpoint() -> EndpointIdentity {
    EndpointIdentity {
        producer_host: "mlab1.lga0t.measurement-lab.org".into(),
        site: "lga0t".into(),
        node: "mlab1".into(),
        experiment: "ndt".into(),
    }
}

fn one_batch(data_dir: &Path) -> Vec<LocalFile> {
    std::fs::create_dir_all(data_dir.join("2026/07/31")).unwrap();
    std::fs::write(data_dir.join("2026/07/31/a"), b"hello").unwrap();
    vec![LocalFile::new("2026/07/31/a", 1785499200, 5).unwrap()]
}

#[tokio::test]
async fn seal_batch_succeeds_when_tar_produces_the_archive() {
    let tmp = tempfile::tempdir().unwrap();
    // Mimics just enough of `tar cfz <archive> ...` to produce the file the
    // caller is waiting on; real content fidelity isn't under test here.
    let fake_tar = write_fake_binary(tmp.path(), "tar", "#!/bin/sh\ntouch \"$2\"\nexit 0\n");
    let batch = one_batch(tmp.path());

    let sealed = scraper_pack::seal_batch(&fake_tar, tmp.path(), &endpoint(), batch)
        .await
        .unwrap();

    assert!(sealed.path.exists());
    assert_eq!(sealed.archive.file_count, 1);
}

#[tokio::test]
async fn seal_batch_fails_when_tar_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    let fake_tar = write_fake_binary(
        tmp.path(),
        "tar",
        "#!/bin/sh\necho 'disk full' 1>&2\nexit 1\n",
    );
    let batch = one_batch(tmp.path());

    let result = scraper_pack::seal_batch(&fake_tar, tmp.path(), &endpoint(), batch).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn seal_batch_fails_when_tar_reports_success_without_writing_the_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let fake_tar = write_fake_binary(tmp.path(), "tar", "#!/bin/sh\nexit 0\n");
    let batch = one_batch(tmp.path());

    let result = scraper_pack::seal_batch(&fake_tar, tmp.path(), &endpoint(), batch).await;
    assert!(matches!(result, Err(scraper_core::ScraperError::NoTarFile(_))));
}
