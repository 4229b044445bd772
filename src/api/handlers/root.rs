use axum::response::IntoResponse;

// axum handler for the bare root, answers liveness probes without touching
// any store
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
