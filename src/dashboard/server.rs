use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    http::Uri,
    Router,
};
use tower_http::compression::CompressionLayer;

use crate::dashboard::{groups, live, response, topics};
use crate::TopicLensEngine;

pub fn router(engine: TopicLensEngine) -> Router {
    let api = Router::new()
        .route("/api/topics", get(topics::list_topics).post(topics::create_topic))
        .route("/api/topics/{topic}", get(topics::describe_topic))
        .route("/api/topics/{topic}/data", get(topics::fetch_messages).post(topics::produce_message))
        .route("/api/topics/{topic}/consumer-groups", get(groups::list_groups))
        .route(
            "/api/topics/{topic}/consumer-groups/{group}/offset",
            get(groups::list_offsets).put(groups::reset_offsets),
        )
        .route("/api/topics/{topic}/consumer-groups/{group}/commit", post(groups::commit_offset))
        .route("/api/consumer-groups/{group}", delete(groups::delete_group))
        .route("/api/live", post(live::open_session))
        .route("/api/live/{id}", get(live::session_snapshot).delete(live::close_session))
        .layer(CompressionLayer::new());

    // SSE stays outside the compression layer so events are flushed as they arrive
    Router::new()
        .merge(api)
        .route("/api/topics/{topic}/data/live", get(live::stream_live))
        .fallback(fallback)
        .with_state(engine)
}

pub async fn start_dashboard_server(engine: TopicLensEngine, host: &str, port: u16) -> std::io::Result<()> {
    let app = router(engine);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Dashboard available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("[Server] Shutdown requested"),
        Err(e) => {
            tracing::warn!("[Server] Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn fallback(uri: Uri) -> impl IntoResponse {
    response::not_found(format!("no route for {}", uri.path()))
}
