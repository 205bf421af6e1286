//! `riskgate snapshot` and `riskgate snapshots`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use riskgate_sync::{create_snapshot, list_snapshots, Snapshot, SnapshotRequest};

use super::{snapshot_dir, source_root, Settings};

/// Arguments for `riskgate snapshot`.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Why the snapshot is being taken.
    #[arg(long, default_value = "manual snapshot")]
    pub purpose: String,

    /// Snapshot root directory (default: ./snapshots).
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Live tree the pushable files are read from (default: .).
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,

    /// Record this environment variable in environment.json (repeatable).
    #[arg(long = "capture-env", value_name = "NAME")]
    pub capture_env: Vec<String>,
}

impl SnapshotArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let profiles = settings.profiles(&file)?;
        let root = snapshot_dir(self.snapshot_dir, &file);
        let live = source_root(self.source_root, &file);
        let files = profiles.pushable_files();

        let environment: BTreeMap<String, String> = self
            .capture_env
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
            .collect();

        let snapshot = create_snapshot(&SnapshotRequest {
            snapshot_root: &root,
            source_root: &live,
            files: &files,
            purpose: &self.purpose,
            environment,
        })
        .with_context(|| format!("failed to create snapshot under {}", root.display()))?;

        eprintln!(
            "{} snapshot {} ({} file(s))",
            "✓".green().bold(),
            snapshot.id,
            snapshot.metadata.file_count
        );
        for name in &snapshot.metadata.missing {
            eprintln!("  {} not present, skipped: {name}", "!".yellow());
        }
        println!("{}", snapshot.id);
        Ok(0)
    }
}

/// Arguments for `riskgate snapshots`.
#[derive(Args, Debug)]
pub struct SnapshotsArgs {
    /// Snapshot root directory (default: ./snapshots).
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Print the snapshot metadata as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Purpose")]
    purpose: String,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            created: snapshot
                .metadata
                .created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            files: snapshot.metadata.file_count,
            purpose: snapshot.metadata.purpose.clone(),
        }
    }
}

impl SnapshotsArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let root = snapshot_dir(self.snapshot_dir, &file);
        let snapshots = list_snapshots(&root)
            .with_context(|| format!("failed to list snapshots in {}", root.display()))?;

        if self.json {
            let payload: Vec<_> = snapshots
                .iter()
                .map(|s| serde_json::json!({ "id": s.id, "dir": s.dir, "metadata": s.metadata }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(0);
        }

        if snapshots.is_empty() {
            println!("no snapshots in {}", root.display());
            return Ok(0);
        }
        let rows: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(0)
    }
}
