use log::{error, info};
use service::{config::Config, logging::Logger};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting login gateway (state TTL {}s, upstream timeout {}s)",
        config.login_state_ttl_secs, config.upstream_timeout_secs
    );

    let sweep_interval = Duration::from_secs(config.state_sweep_interval_secs.max(1));

    let app_state = match web::AppState::from_config(config) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to configure the login gateway: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "Enabled login providers: [{}]",
        app_state.gateway.provider_ids().join(", ")
    );

    let sweeper = domain::spawn_sweeper(app_state.gateway.state_store(), sweep_interval);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped with an error: {e}");
        sweeper.abort();
        std::process::exit(1);
    }

    sweeper.abort();
}
