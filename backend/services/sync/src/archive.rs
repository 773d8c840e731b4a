use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// `{stream}_incremental_{branch}_{YYYYmmdd_HHMMSS}.csv`
pub fn export_file_name(stream: &str, branch: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_incremental_{}_{}.csv",
        stream,
        branch,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Move `src` into `dest_dir`, keeping its file name. Falls back to copy and
/// delete when a rename is not possible (e.g. across filesystems).
pub async fn archive_file(src: &Path, dest_dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let name = src.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", src.display()),
        )
    })?;
    let dest = dest_dir.join(name);

    if tokio::fs::rename(src, &dest).await.is_err() {
        tokio::fs::copy(src, &dest).await?;
        tokio::fs::remove_file(src).await?;
    }
    Ok(dest)
}

/// Archive after a successful import. Failure only costs future bootstraps
/// this file, so it is logged and otherwise ignored.
pub async fn archive_or_warn(src: &Path, dest_dir: &Path) {
    match archive_file(src, dest_dir).await {
        Ok(dest) => tracing::info!(from = %src.display(), to = %dest.display(), "archived export"),
        Err(e) => tracing::warn!(path = %src.display(), error = %e, "failed to archive export"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_embeds_stream_branch_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 7, 9, 6, 5, 4).unwrap();
        assert_eq!(
            export_file_name("transactions", "br-1", at),
            "transactions_incremental_br-1_20240709_060504.csv"
        );
    }

    #[tokio::test]
    async fn moves_file_into_seed_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = crate::test_support::write_csv(dir.path(), "x.csv", "a\n1\n");
        let seed = dir.path().join("data").join("transactions");

        let dest = archive_file(&src, &seed).await.unwrap();

        assert_eq!(dest, seed.join("x.csv"));
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "a\n1\n");
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = archive_file(&dir.path().join("gone.csv"), &dir.path().join("seed")).await;
        assert!(res.is_err());
    }
}
