//! Config command implementation.

use anyhow::{anyhow, Context, Result};

use ferry_core::config::Config;

use super::{ConfigAction, ConfigArgs};
use crate::ui::{format_duration, parse_duration};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = super::load_config();
            println!();
            println!("Ferry Configuration");
            println!("{}", "─".repeat(50));
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Get { key } => {
            let config = Config::load().context("Failed to load configuration")?;
            match get_config_value(&config, &key) {
                Some(v) => println!("{}: {}", key, v),
                None => println!("Unknown configuration key: {}", key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            if set_config_value(&mut config, &key, &value)? {
                config.validate()?;
                config.save().context("Failed to save configuration")?;
                println!("Set {} = {}", key, value);
            } else {
                println!("Unknown configuration key: {}", key);
            }
        }

        ConfigAction::Reset => {
            Config::default()
                .save()
                .context("Failed to save configuration")?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "stream.endpoint" => Some(config.stream.endpoint.clone()),
        "stream.connect_timeout" => Some(format_duration(config.stream.connect_timeout)),
        "stream.idle_timeout" => Some(format_duration(config.stream.idle_timeout)),
        "stream.user_agent" => Some(config.stream.user_agent.clone()),
        "display.refresh_interval" => Some(format_duration(config.display.refresh_interval)),
        "display.json" => Some(config.display.json.to_string()),
        _ => None,
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    let duration = || parse_duration(value).ok_or_else(|| anyhow!("Invalid duration: {}", value));

    match key {
        "stream.endpoint" => config.stream.endpoint = value.to_string(),
        "stream.connect_timeout" => config.stream.connect_timeout = duration()?,
        "stream.idle_timeout" => config.stream.idle_timeout = duration()?,
        "stream.user_agent" => config.stream.user_agent = value.to_string(),
        "display.refresh_interval" => config.display.refresh_interval = duration()?,
        "display.json" => config.display.json = value.parse()?,
        _ => return Ok(false),
    }
    Ok(true)
}
