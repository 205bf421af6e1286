//! `riskgate profiles`: list the file bundles.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use riskgate_core::Profile;

use super::Settings;

/// Arguments for `riskgate profiles`.
#[derive(Args, Debug)]
pub struct ProfilesArgs {
    /// Print the profiles as a JSON object.
    #[arg(long)]
    pub json: bool,
}

impl ProfilesArgs {
    pub fn run(self, settings: &Settings) -> Result<u8> {
        let file = settings.file_config()?;
        let profiles = settings.profiles(&file)?;

        if self.json {
            let payload: serde_json::Map<String, serde_json::Value> = Profile::all()
                .iter()
                .map(|p| (p.name().to_string(), serde_json::json!(profiles.resolve(*p))))
                .collect();
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(0);
        }

        for profile in Profile::all() {
            println!("{}", profile.name().bold());
            for name in profiles.resolve(*profile) {
                println!("  {name}");
            }
        }
        Ok(0)
    }
}
