//! `pengate serve`: Start the HTTP gateway.

use pengate_config::AppConfig;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Pengate Gateway");
    println!("   Listening: {}", config.bind_addr());
    println!("   Provider:  {}", config.default_provider);
    println!("   Canvas:    {}", config.canvas.mode);
    println!("   Frontend:  {}", config.gateway.frontend_url);
    if !config.has_api_key(&config.default_provider) {
        eprintln!(
            "   Warning: no API key for '{}'; chat requests will get 503",
            config.default_provider
        );
    }

    pengate_gateway::start(config).await?;

    Ok(())
}
