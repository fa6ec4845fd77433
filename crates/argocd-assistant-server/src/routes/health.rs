use axum::{http::StatusCode, routing::get, Router};

async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub fn routes() -> Router {
    Router::new().route("/", get(liveness))
}
