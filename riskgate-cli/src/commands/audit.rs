//! `riskgate audit`: show the tail of the audit log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use riskgate_core::{tail_audit, AuditRecord, AuditResult};

use super::{audit_path, Settings};

/// Arguments for `riskgate audit`.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Audit log path (default: ./risk_action_audit.jsonl).
    #[arg(long, value_name = "PATH")]
    pub audit: Option<PathBuf>,

    /// Number of most recent records to show.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub lines: usize,

    /// Print the records as JSON lines, exactly as stored.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Machines")]
    machines: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Files")]
    files: String,
}

impl From<&AuditRecord> for AuditRow {
    fn from(record: &AuditRecord) -> Self {
        let files = if record.files.is_empty() {
            String::new()
        } else {
            let ok = record.files.iter().filter(|f| f.ok).count();
            format!("{ok}/{}", record.files.len())
        };
        Self {
            time: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: record.kind.to_string(),
            actor: record.actor.clone(),
            machines: record.machines.clone(),
            result: colored_result(record.result),
            files,
        }
    }
}

fn colored_result(result: AuditResult) -> String {
    match result {
        AuditResult::Ok | AuditResult::Success => result.as_str().green().to_string(),
        AuditResult::FailedVerify => result.as_str().red().to_string(),
        _ => result.as_str().yellow().to_string(),
    }
}

impl AuditArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let path = audit_path(self.audit, &file);
        let records = tail_audit(&path, self.lines)
            .with_context(|| format!("failed to read audit log {}", path.display()))?;

        if self.json {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            return Ok(0);
        }

        if records.is_empty() {
            println!("no audit records in {}", path.display());
            return Ok(0);
        }
        let rows: Vec<AuditRow> = records.iter().map(AuditRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(0)
    }
}
