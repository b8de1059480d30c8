//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration as TOML
    Show,

    /// Show which config file is in use
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    match args.command {
        ConfigCommand::Show => {
            print!("{}", toml::to_string_pretty(&loaded.config)?);
            if !loaded.overrides.is_empty() {
                println!();
                println!("# overridden from environment: {}", loaded.overrides.join(", "));
            }
        }
        ConfigCommand::Path => match &loaded.source {
            Some(path) => println!("{}", path.display()),
            None => println!("(defaults, no config file)"),
        },
    }

    Ok(())
}
