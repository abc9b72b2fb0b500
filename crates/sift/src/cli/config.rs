use anyhow::Result;
use sift_upload::Config;

/// Print the effective configuration after files and environment are merged.
#[derive(Debug, clap::Args)]
pub struct ShowConfig {
    /// Print JSON instead of TOML.
    #[arg(long)]
    json: bool,
}

impl ShowConfig {
    pub fn run(self, config: &Config) -> Result<i32> {
        let rendered = if self.json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config)?
        };
        println!("{rendered}");
        Ok(0)
    }
}
