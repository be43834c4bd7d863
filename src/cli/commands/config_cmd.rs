//! Configuration management commands.

use console::style;

use ocrflow::Config;

use crate::cli::icons::{arrow, warning};

/// Print the effective configuration as TOML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => eprintln!("{} Loaded from {}", arrow(), path.display()),
        None => eprintln!("{} No config file found, using defaults", warning()),
    }
    eprintln!(
        "  {} Export directory: {}",
        style("→").dim(),
        config.export_dir().display()
    );
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
