use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use sift_upload::Config;

use super::{Session, exit_code, print_entries, print_summary};

/// Upload files into a scratch workspace and report what the checks found.
///
/// Exits with status 1 when the upload is not ready.
#[derive(Debug, clap::Args)]
pub struct Check {
    /// Archives or loose files, added in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Print the status and full log as JSON.
    #[arg(long)]
    json: bool,

    /// Keep the workspace instead of purging it.
    #[arg(long)]
    keep: bool,
}

impl Check {
    pub fn run(self, config: Config) -> Result<i32> {
        let session = Session::open(config)?;
        let outcomes = session.upload(&self.inputs)?;
        let status = session.status()?;

        if self.json {
            let report = json!({ "status": status, "log": session.log()? });
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_entries(outcomes.iter().flat_map(|o| o.entries()));
            print_summary(&status);
        }

        session.finish(self.keep)?;
        Ok(exit_code(status.readiness))
    }
}
