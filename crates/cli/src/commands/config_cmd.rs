//! `pengate config`: Print the effective configuration.

use pengate_config::AppConfig;

pub fn show(config: &AppConfig) {
    println!("{}", config.to_redacted_toml());
}
