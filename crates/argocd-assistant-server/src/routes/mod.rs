// Export route modules
pub mod agent;
pub mod health;
pub mod ui_stream;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(agent::routes(state))
}
