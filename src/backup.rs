//! Local JSON snapshots taken around the destination overwrite.
//!
//! Clearing and then writing the destination is not atomic. Before the clear, the pipeline saves
//! what the destination held and the table it is about to write, so either can be restored by
//! hand if the run dies in between.

use crate::error::Res;
use crate::{utils, Config};
use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

/// Prefix for snapshots of the destination's rows as they were before the clear.
pub const MASTER_PRE: &str = "master-pre";

/// Prefix for snapshots of the aggregate table about to be written.
pub const MASTER_TABLE: &str = "master-table";

const EXTENSION: &str = "json";

/// Manages snapshot file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    /// Creates a new `Backup` instance from a `Config`.
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
        }
    }

    /// Saves `data` as a pretty-printed JSON snapshot file.
    ///
    /// The filename format is `{prefix}.YYYY-MM-DD-NNN.json` where NNN is a sequence number.
    /// Automatically rotates old snapshots, keeping only `backup_copies` files per prefix.
    ///
    /// Returns the path to the created file.
    pub async fn save_json<T>(&self, prefix: &str, data: &T) -> Res<PathBuf>
    where
        T: Serialize + ?Sized,
    {
        let date = today();
        let seq = self.next_sequence_number(prefix, &date).await?;
        let filename = format!("{prefix}.{date}-{seq:03}.{EXTENSION}");
        let path = self.backups_dir.join(&filename);

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize the {prefix} snapshot to JSON"))?;
        utils::write(&path, json).await?;

        self.rotate(prefix).await?;

        Ok(path)
    }

    /// Scans the backups directory for existing files with the given prefix and date,
    /// and returns the next sequence number.
    async fn next_sequence_number(&self, prefix: &str, date: &str) -> Res<u32> {
        let mut max_seq: u32 = 0;

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(seq) = parse_sequence_number(&name, prefix, date) {
                max_seq = max_seq.max(seq);
            }
        }

        Ok(max_seq + 1)
    }

    /// Deletes the oldest snapshots with the given prefix, keeping `backup_copies` of them.
    async fn rotate(&self, prefix: &str) -> Res<()> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_snapshot_file(&name, prefix) {
                files.push((entry.path(), name));
            }
        }

        // Filenames sort by date, then by sequence number.
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove_file(&path).await?;
        }

        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses the sequence number from a snapshot filename like `master-pre.2025-12-14-003.json`.
/// Returns None if the filename doesn't match the expected pattern.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str) -> Option<u32> {
    filename
        .strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(&format!(".{EXTENSION}"))?
        .parse()
        .ok()
}

fn is_snapshot_file(filename: &str, prefix: &str) -> bool {
    filename.starts_with(&format!("{prefix}.")) && filename.ends_with(&format!(".{EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[test]
    fn test_parse_sequence_number() {
        assert_eq!(
            parse_sequence_number("master-pre.2025-12-14-001.json", MASTER_PRE, "2025-12-14"),
            Some(1)
        );
        assert_eq!(
            parse_sequence_number("master-table.2025-12-14-042.json", MASTER_TABLE, "2025-12-14"),
            Some(42)
        );
        // Wrong prefix
        assert_eq!(
            parse_sequence_number("master-table.2025-12-14-001.json", MASTER_PRE, "2025-12-14"),
            None
        );
        // Wrong date
        assert_eq!(
            parse_sequence_number("master-pre.2025-12-13-001.json", MASTER_PRE, "2025-12-14"),
            None
        );
    }

    #[test]
    fn test_is_snapshot_file() {
        assert!(is_snapshot_file("master-pre.2025-12-14-001.json", MASTER_PRE));
        assert!(!is_snapshot_file("master-pre.2025-12-14-001.json", MASTER_TABLE));
        assert!(!is_snapshot_file("master-pre.2025-12-14-001", MASTER_PRE));
    }

    #[tokio::test]
    async fn test_save_json_sequences_and_rotates() {
        let env = TestEnv::new().await;
        let backup = env.config().backup();
        let rows = vec![vec!["Category".to_string(), "Amount".to_string()]];

        let first = backup.save_json(MASTER_PRE, &rows).await.unwrap();
        let second = backup.save_json(MASTER_PRE, &rows).await.unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-002.json"));

        let saved: Vec<Vec<String>> = utils::deserialize(&second).await.unwrap();
        assert_eq!(saved, rows);

        // TestEnv keeps the default of five copies.
        for _ in 0..6 {
            backup.save_json(MASTER_PRE, &rows).await.unwrap();
        }
        let mut count = 0;
        let mut dir = utils::read_dir(env.config().backups()).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            if is_snapshot_file(&entry.file_name().to_string_lossy(), MASTER_PRE) {
                count += 1;
            }
        }
        assert_eq!(count, 5);
    }
}
