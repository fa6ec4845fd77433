mod configuration;
mod error;
mod logging;
mod routes;
mod state;

use configuration::Settings;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine, the variables may come from the real environment
    dotenv::dotenv().ok();
    logging::init_logging()?;

    let settings = Settings::new()?;
    let agent_config = settings.agent_config()?;
    let addr = settings.socket_addr()?;
    info!(
        model = %settings.model,
        max_steps = agent_config.max_steps,
        "configuration loaded"
    );

    let state = AppState::new(
        settings.provider_config(),
        settings.argocd_api_token.clone(),
        agent_config,
    );

    // The Argo CD UI extension calls from its own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
