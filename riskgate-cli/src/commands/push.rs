//! `riskgate push`: gate, copy, verify, audit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value};

use riskgate_core::{
    config::{first_non_empty, DEFAULT_MACHINES, DEFAULT_RETRIES, DEFAULT_TIMEOUT},
    PushConfig,
};
use riskgate_gate::HttpProbe;
use riskgate_sync::{push, PushOutcome, PushRequest, PushState};

use super::{audit_path, source_root, Settings};
use crate::ProfileArg;

/// Arguments for `riskgate push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Health endpoint that must answer 2xx before anything is copied.
    #[arg(long, env = "RISKGATE_HEALTH_URL", value_name = "URL")]
    pub health_url: Option<String>,

    /// Destination directory (mounted share) readable by the server.
    #[arg(long, env = "RISKGATE_COPY_TO", value_name = "DIR")]
    pub copy_to: Option<PathBuf>,

    /// Who or what triggered the push (default: $USER).
    #[arg(long)]
    pub actor: Option<String>,

    /// Audit log path (default: ./risk_action_audit.jsonl).
    #[arg(long, value_name = "PATH")]
    pub audit: Option<PathBuf>,

    /// File bundle to push: content | tooling.
    #[arg(long, default_value = "content")]
    pub profile: ProfileArg,

    /// Explicit relative file list; overrides --profile.
    #[arg(long, num_args = 1.., value_name = "FILE")]
    pub files: Vec<String>,

    /// Directory the file names are relative to (default: .).
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,

    /// Direction label recorded in the audit log.
    #[arg(long)]
    pub machines: Option<String>,

    /// Per-attempt health check timeout in seconds.
    #[arg(long, value_name = "SEC")]
    pub timeout: Option<f64>,

    /// Health check retries after the first attempt.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Extra KEY=VALUE fields recorded in every audit record.
    #[arg(long = "extra", value_name = "KEY=VALUE")]
    pub extra: Vec<String>,

    /// Run the gate and report what would be copied, without copying.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let profiles = settings.profiles(&file)?;

        let timeout = match self.timeout {
            Some(secs) if !secs.is_finite() || secs <= 0.0 => {
                bail!("--timeout must be a positive number of seconds, got {secs}")
            }
            Some(secs) => Duration::from_secs_f64(secs),
            None => file.timeout().unwrap_or(DEFAULT_TIMEOUT),
        };

        let actor = first_non_empty([
            self.actor.clone(),
            file.actor.clone(),
            std::env::var("USER").ok(),
            std::env::var("USERNAME").ok(),
        ])
        .unwrap_or_else(|| "unknown".to_string());

        let mut config = PushConfig::new(actor);
        config.health_url = first_non_empty([self.health_url.clone(), file.health_url.clone()]);
        config.destination = self
            .copy_to
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| file.copy_to.clone());
        config.source_root = source_root(self.source_root.clone(), &file);
        config.audit_path = audit_path(self.audit.clone(), &file);
        config.machines = first_non_empty([self.machines.clone(), file.machines.clone()])
            .unwrap_or_else(|| DEFAULT_MACHINES.to_string());
        config.timeout = timeout;
        config.retries = self.retries.or(file.retries).unwrap_or(DEFAULT_RETRIES);
        config.extra = parse_extra(&self.extra)?;

        let request = PushRequest {
            profile: self.profile.into(),
            files: self.files,
            dry_run: self.dry_run,
        };

        let outcome = push(&HttpProbe, &config, &profiles, &request)
            .with_context(|| format!("push aborted (audit log {})", config.audit_path.display()))?;

        if self.json {
            print_json(&outcome)?;
        } else {
            print_outcome(&outcome, &config, self.dry_run);
        }
        Ok(outcome.exit_code())
    }
}

fn parse_extra(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut extra = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--extra expects KEY=VALUE, got '{pair}'");
        };
        if key.trim().is_empty() {
            bail!("--extra key must not be empty in '{pair}'");
        }
        extra.insert(key.trim().to_string(), Value::from(value));
    }
    Ok(extra)
}

fn print_json(outcome: &PushOutcome) -> Result<()> {
    let payload = serde_json::json!({
        "state": format!("{:?}", outcome.state),
        "result": outcome.result.map(|r| r.as_str()),
        "exit_code": outcome.exit_code(),
        "planned": outcome.planned,
        "missing": outcome.missing,
        "health": outcome.health,
        "files": outcome.files,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize push outcome")?
    );
    Ok(())
}

fn print_outcome(outcome: &PushOutcome, config: &PushConfig, dry_run: bool) {
    let audit = config.audit_path.display();
    match outcome.state {
        PushState::Aborted if !outcome.missing.is_empty() => {
            println!(
                "{} push aborted: {} missing source file(s)",
                "✗".red().bold(),
                outcome.missing.len()
            );
            for name in &outcome.missing {
                println!("  ?  {name}");
            }
        }
        PushState::Aborted => {
            println!(
                "{} push aborted: health URL and destination are both required \
                 (--health-url/RISKGATE_HEALTH_URL, --copy-to/RISKGATE_COPY_TO)",
                "✗".red().bold()
            );
        }
        PushState::Blocked => {
            let preview = outcome
                .health
                .as_ref()
                .map(|h| format!("status {}: {}", h.status_code, h.body_preview))
                .unwrap_or_default();
            println!(
                "{} push blocked: remote not responsive ({preview})",
                "✗".red().bold()
            );
        }
        PushState::Verified if dry_run => {
            println!("[dry-run] ✓ gate passed; would push {} file(s)", outcome.planned.len());
            for name in &outcome.planned {
                println!("  ~  {name}");
            }
        }
        _ => {
            let verified = outcome.files.iter().filter(|f| f.ok).count();
            let mark = if outcome.succeeded() {
                "✓".green().bold()
            } else {
                "✗".red().bold()
            };
            println!(
                "{mark} pushed {verified}/{} file(s) verified",
                outcome.files.len()
            );
            for file in &outcome.files {
                if file.ok {
                    println!("  ✎  {}", file.destination_path.display());
                } else {
                    let reason = file.error.as_deref().unwrap_or("verification failed");
                    println!("  ✗  {} ({reason})", file.destination_path.display());
                }
            }
        }
    }
    println!("  audit: {audit}");
}
