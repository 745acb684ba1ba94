//! `config` subcommands. These never contact the controller.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::config_file;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_file(global);
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let config = unipower_config::load_config_from(&path)?;
            output::print_output(&config.to_redacted_toml()?, global.quiet);
            Ok(())
        }
    }
}
