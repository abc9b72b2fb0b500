use std::path::PathBuf;

use anyhow::{Context, Result};
use sift_upload::{Config, Readiness};

use super::{Session, print_entries, print_summary};

/// Check files and write the cleaned result as a gzipped tarball.
#[derive(Debug, clap::Args)]
pub struct Pack {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Where to write the package.
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Write the package even when checks found errors.
    #[arg(long)]
    force: bool,
}

impl Pack {
    pub fn run(self, config: Config) -> Result<i32> {
        let session = Session::open(config)?;
        let outcomes = session.upload(&self.inputs)?;
        let status = session.status()?;
        print_entries(outcomes.iter().flat_map(|o| o.entries()));
        print_summary(&status);

        if status.readiness == Readiness::Errors && !self.force {
            eprintln!("not packaging: fix the errors above or pass --force");
            session.finish(false)?;
            return Ok(1);
        }

        let package = session.package()?;
        std::fs::write(&self.output, &package)
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        println!(
            "wrote {} ({} bytes, checksum {})",
            self.output.display(),
            package.len(),
            status.checksum
        );
        session.finish(false)?;
        Ok(0)
    }
}
