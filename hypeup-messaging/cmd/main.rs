use anyhow::Result;
use hypeup_core::config::load_config;
use hypeup_core::tracing::init_tracing;
use hypeup_messaging::service::ApplicationBootstrap;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("HYPEUP_CONFIG").ok();
    let app_config = load_config(config_path.as_deref().or(Some("config")));
    init_tracing("hypeup-messaging", Some(&app_config.logging));

    ApplicationBootstrap::run(app_config).await
}
