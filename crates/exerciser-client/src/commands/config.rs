//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", render(config)?);
    Ok(())
}

/// Renders the effective configuration as TOML.
pub fn render(config: &ClientConfig) -> ClientResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_parses_back() {
        let mut config = ClientConfig::default();
        config.demo.robot_name = "Rover".to_string();
        config.session.trace_messages = true;

        let text = render(&config).unwrap();
        assert!(text.contains("[demo]"));
        assert!(text.contains("robot_name = \"Rover\""));

        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn validate_surfaces_config_errors() {
        let mut config = ClientConfig::default();
        config.demo.script = vec!["warp".to_string()];
        assert!(matches!(validate(&config), Err(ClientError::Config(_))));
    }
}
