//! riskgate: risk-gated file push with an append-only audit trail.
//!
//! # Usage
//!
//! ```text
//! riskgate push --health-url URL --copy-to DIR [--profile content|tooling] [--files F...]
//!               [--actor NAME] [--audit PATH] [--timeout SEC] [--retries N] [--dry-run]
//! riskgate snapshot --purpose TEXT [--capture-env NAME]...
//! riskgate snapshots
//! riskgate rollback <SNAPSHOT_ID> [--target DIR] [--yes]
//! riskgate audit [--lines N] [--json]
//! riskgate profiles [--json]
//! ```
//!
//! Exit codes for `push`: 0 all files verified, 1 verification mismatch,
//! 2 aborted before any copy. `rollback`: 0 all restored, 1 otherwise.

mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{ArgAction, Parser, Subcommand};

use commands::{
    audit::AuditArgs,
    profiles::ProfilesArgs,
    push::PushArgs,
    rollback::RollbackArgs,
    snapshot::{SnapshotArgs, SnapshotsArgs},
    Settings,
};
use riskgate_core::Profile;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "riskgate",
    version,
    about = "Push authoritative files to a server share, only when the server answers",
    long_about = None,
)]
struct Cli {
    /// Path to riskgate.yaml (default: ./riskgate.yaml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase diagnostic output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the remote, then atomically copy a profile's files.
    Push(PushArgs),

    /// Capture the pushable file set into a timestamped snapshot.
    Snapshot(SnapshotArgs),

    /// List existing snapshots.
    Snapshots(SnapshotsArgs),

    /// Restore every file of a snapshot into the live tree.
    Rollback(RollbackArgs),

    /// Show the tail of the audit log.
    Audit(AuditArgs),

    /// Show the files each profile pushes.
    Profiles(ProfilesArgs),
}

// ---------------------------------------------------------------------------
// Shared Profile argument, parsed from CLI strings, converts to core type
// ---------------------------------------------------------------------------

/// Thin wrapper so clap rejects unknown profiles while parsing arguments.
#[derive(Debug, Clone, Default)]
pub struct ProfileArg(pub Profile);

impl FromStr for ProfileArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<Profile>().map(Self).map_err(|e| e.to_string())
    }
}

impl fmt::Display for ProfileArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ProfileArg> for Profile {
    fn from(p: ProfileArg) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Exit status for errors escaping `push` and `snapshot`.
const EXIT_ABORTED: u8 = 2;
/// Exit status for errors escaping the other commands.
const EXIT_FAILED: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = Settings {
        config: cli.config,
    };

    let (result, failure_code) = match cli.command {
        Commands::Push(args) => (args.run(&settings), EXIT_ABORTED),
        Commands::Snapshot(args) => (args.run(&settings), EXIT_ABORTED),
        Commands::Snapshots(args) => (args.run(&settings), EXIT_FAILED),
        Commands::Rollback(args) => (args.run(&settings), EXIT_FAILED),
        Commands::Audit(args) => (args.run(&settings), EXIT_FAILED),
        Commands::Profiles(args) => (args.run(&settings), EXIT_FAILED),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(failure_code)
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("RISKGATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
