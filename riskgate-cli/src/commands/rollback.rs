//! `riskgate rollback`: restore a snapshot into the live tree.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use riskgate_sync::{load_snapshot, rollback, RestoreResult};

use super::{snapshot_dir, Settings};
use crate::EXIT_FAILED;

/// Arguments for `riskgate rollback`.
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Snapshot id, e.g. snapshot_20250101_120000.
    pub id: String,

    /// Snapshot root directory (default: ./snapshots).
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Restore into this directory instead of the recorded source root.
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Skip the interactive confirmation.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Tabled)]
struct RestoreRow {
    #[tabled(rename = "")]
    mark: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&RestoreResult> for RestoreRow {
    fn from(result: &RestoreResult) -> Self {
        Self {
            mark: if result.ok { "✓" } else { "✗" }.to_string(),
            file: result.live_path.display().to_string(),
            error: result.error.clone().unwrap_or_default(),
        }
    }
}

impl RollbackArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let root = snapshot_dir(self.snapshot_dir, &file);
        let snapshot = load_snapshot(&root, &self.id)
            .with_context(|| format!("cannot roll back to '{}'", self.id))?;
        let target = self
            .target
            .clone()
            .unwrap_or_else(|| snapshot.metadata.source_root.clone());

        if !self.yes {
            let question = format!(
                "Restore {} file(s) from {} into {}? Type 'yes' to continue: ",
                snapshot.metadata.file_count,
                snapshot.id,
                target.display()
            );
            if !confirm(&question)? {
                eprintln!("rollback cancelled");
                return Ok(EXIT_FAILED);
            }
        }

        let report = rollback(&root, &snapshot.id, Some(&target), true)
            .with_context(|| format!("rollback from '{}' failed", snapshot.id))?;

        let rows: Vec<RestoreRow> = report.files.iter().map(RestoreRow::from).collect();
        if !rows.is_empty() {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }

        if report.all_restored() {
            println!(
                "{} restored {} file(s) from {}",
                "✓".green().bold(),
                report.files.len(),
                report.snapshot_id
            );
            Ok(0)
        } else {
            let failed = report.failed().count();
            println!(
                "{} {failed} of {} file(s) could not be restored",
                "✗".red().bold(),
                report.files.len()
            );
            Ok(EXIT_FAILED)
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question}");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
