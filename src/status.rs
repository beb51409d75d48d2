use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::queue::{DispatchQueue, NotifyStatus};

/// Router exposing `GET /` with delivery counters.
pub fn router(queue: DispatchQueue) -> Router {
    Router::new().route("/", get(status)).with_state(queue)
}

/// Serve the status route on `port` until the task is dropped.
pub async fn serve(port: u16, queue: DispatchQueue) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Ready on http://localhost:{port}");
    axum::serve(listener, router(queue)).await
}

async fn status(State(queue): State<DispatchQueue>) -> Html<String> {
    Html(render_status(&queue.status(), Utc::now()))
}

pub fn render_status(status: &NotifyStatus, now: DateTime<Utc>) -> String {
    let mut out = format!("Total notifications sent: {}<br/>\n", status.total_notified);
    if status.total_failed > 0 {
        out.push_str(&format!("Failed notifications: {}<br/>\n", status.total_failed));
    }
    if let Some(last) = status.last_notified {
        out.push_str(&format!(
            "Last notified at: {}<br/>\n",
            last.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
    }
    out.push_str(&format!(
        "Current UTC time: {}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out
}
