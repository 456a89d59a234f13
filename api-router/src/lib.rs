use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    chat::chat, liveness::live, projects::get_projects, readiness::ready, upload::upload,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the question-answering API.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probe endpoints (for k8s/systemd probes)
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let api = Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(
                app_state.config.upload_max_body_bytes,
            )),
        )
        .route("/chat", post(chat))
        .route("/projects", get(get_projects));

    probes.merge(api)
}
